//! Per-zone reductions of population and concentration rasters.
//!
//! Both reductions walk the zone raster cell by cell and accumulate into dense
//! per-zone buffers; the resulting tables have one row per (zone, time step)
//! for every zone that owns at least one cell, ordered by zone then time.

use crate::aggregation::error::AggregationError;
use crate::aggregation::masks::MaskSet;
use crate::raster::field::{RasterField, Surface};
use crate::schema::{affected_population_column, MEAN, TIME, TOTAL_POPULATION, ZONE_CODE};
use crate::utils::days_since_epoch;
use crate::zones::rasterizer::ZoneRaster;
use chrono::NaiveDateTime;
use log::debug;
use polars::prelude::*;

fn zone_time_frame(zones: Vec<u32>, days: Vec<i32>, value: Series) -> PolarsResult<DataFrame> {
    let time = Series::new(TIME.into(), days).cast(&DataType::Date)?;
    DataFrame::new(vec![
        Series::new(ZONE_CODE.into(), zones).into(),
        time.into(),
        value.into(),
    ])
}

fn day_numbers(times: &[NaiveDateTime]) -> Vec<i32> {
    times.iter().map(|t| days_since_epoch(t.date())).collect()
}

/// Zones owning at least one cell.
fn present_zones(zones: &ZoneRaster) -> Vec<bool> {
    let mut present = vec![false; zones.zone_count()];
    for code in zones.codes().iter().flatten() {
        present[*code as usize] = true;
    }
    present
}

/// Population per zone and time step, in total and per concentration band.
///
/// The total sums every cell of a zone. A band sums the cells of the zone
/// whose mask is set; the band tables are left-joined onto the total so a zone
/// with no population in a band reports 0 for it. No-data population counts
/// as zero.
///
/// Columns: `zone_code`, `time`, `total_population`, then
/// `affected_population_<band>` per mask.
pub fn population_bands(
    population: &Surface,
    zones: &ZoneRaster,
    masks: &MaskSet,
) -> Result<DataFrame, AggregationError> {
    zones
        .grid()
        .ensure_same(population.grid(), "population vs zones")?;
    zones.grid().ensure_same(masks.grid(), "masks vs zones")?;

    let cells = zones.grid().cell_count();
    let days = day_numbers(masks.times());
    let steps = days.len();
    let present = present_zones(zones);

    let mut totals = vec![0.0f64; zones.zone_count()];
    for (code, &people) in zones.codes().iter().zip(population.values()) {
        if let (Some(code), false) = (code, people.is_nan()) {
            totals[*code as usize] += people as f64;
        }
    }

    let (mut zone_col, mut day_col, mut total_col) = (Vec::new(), Vec::new(), Vec::new());
    for (zone, total) in totals.iter().enumerate().filter(|(z, _)| present[*z]) {
        for &day in &days {
            zone_col.push(zone as u32);
            day_col.push(day);
            total_col.push(*total);
        }
    }
    let total_frame = zone_time_frame(
        zone_col,
        day_col,
        Series::new(TOTAL_POPULATION.into(), total_col),
    )?;

    let keys = [col(ZONE_CODE), col(TIME)];
    let mut joined = total_frame.lazy();
    let mut band_columns = Vec::with_capacity(masks.masks().len());

    for mask in masks.masks() {
        let mut sums = vec![0.0f64; zones.zone_count() * steps];
        let mut hit = vec![false; zones.zone_count() * steps];
        for t in 0..steps {
            for (cell, code) in zones.codes().iter().enumerate() {
                let Some(code) = code else { continue };
                if !mask.is_set(t, cell, cells) {
                    continue;
                }
                let slot = *code as usize * steps + t;
                hit[slot] = true;
                let people = population.values()[cell];
                if !people.is_nan() {
                    sums[slot] += people as f64;
                }
            }
        }

        let (mut zone_col, mut day_col, mut sum_col) = (Vec::new(), Vec::new(), Vec::new());
        for slot in (0..sums.len()).filter(|&s| hit[s]) {
            zone_col.push((slot / steps) as u32);
            day_col.push(days[slot % steps]);
            sum_col.push(sums[slot]);
        }
        let name = affected_population_column(&mask.label());
        debug!("Band {} covers {} zone-steps", mask.label(), zone_col.len());
        let band_frame = zone_time_frame(zone_col, day_col, Series::new(name.as_str().into(), sum_col))?;

        joined = joined.join(
            band_frame.lazy(),
            keys.clone(),
            keys.clone(),
            JoinArgs::new(JoinType::Left),
        );
        band_columns.push(col(name.as_str()).fill_null(lit(0.0)));
    }

    let frame = joined
        .with_columns(band_columns)
        .sort_by_exprs(keys.to_vec(), SortMultipleOptions::default())
        .collect()?;
    Ok(frame)
}

/// Mean concentration per zone and time step.
///
/// No-data cells are left out of the mean. A zone whose cells are all no-data
/// at a time step gets a null mean.
///
/// Columns: `zone_code`, `time`, `pm2p5_mean`.
pub fn pollution_average(
    field: &RasterField,
    zones: &ZoneRaster,
) -> Result<DataFrame, AggregationError> {
    zones
        .grid()
        .ensure_same(field.grid(), "concentration vs zones")?;

    let days = day_numbers(field.times());
    let steps = days.len();
    let present = present_zones(zones);
    let mut sums = vec![0.0f64; zones.zone_count() * steps];
    let mut counts = vec![0u32; zones.zone_count() * steps];

    for (t, (_, layer)) in field.layers().enumerate() {
        for (code, &value) in zones.codes().iter().zip(layer) {
            if let (Some(code), false) = (code, value.is_nan()) {
                let slot = *code as usize * steps + t;
                sums[slot] += value as f64;
                counts[slot] += 1;
            }
        }
    }

    let (mut zone_col, mut day_col, mut mean_col) = (Vec::new(), Vec::new(), Vec::new());
    for slot in (0..sums.len()).filter(|&s| present[s / steps]) {
        zone_col.push((slot / steps) as u32);
        day_col.push(days[slot % steps]);
        mean_col.push((counts[slot] > 0).then(|| sums[slot] / counts[slot] as f64));
    }
    Ok(zone_time_frame(zone_col, day_col, Series::new(MEAN.into(), mean_col))?)
}
