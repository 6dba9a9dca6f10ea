//! Runs one pipeline invocation from input files to a written table.
//!
//! The stages, in order: load boundaries at the configured level, load and
//! slice the concentration field, average it into time buckets, rescale the
//! grid, burn the boundaries into zones, average concentrations per zone,
//! then for yearly runs align population and count people per concentration
//! band, and for daily runs classify the means. The per-zone table is joined
//! to the boundary metadata, finished through the output schema and written.

use crate::aggregation::masks::build_masks;
use crate::aggregation::zonal::{pollution_average, population_bands};
use crate::boundaries::boundary::Boundary;
use crate::boundaries::geojson::load_boundaries;
use crate::classify::classify;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::error::PipelineError;
use crate::pipeline::writer::write_table;
use crate::raster::align::{align_surface, rescale, Resampling};
use crate::raster::field::RasterField;
use crate::raster::io::{read_field, read_surface};
use crate::raster::temporal::{resample_mean, slice_time};
use crate::schema::{
    affected_population_column, percentage_column, OutputSchema, COUNTRY_CODE, EU_CATEGORY,
    IDENTIFIER, MEAN, NAME, TIME, TOTAL_POPULATION, WHO_CATEGORY, ZONE_CODE,
};
use crate::utils::StageTimer;
use crate::zones::rasterizer::{rasterize, ZoneRaster, ZoneTable};
use log::{debug, info, warn};
use polars::prelude::*;
use std::path::PathBuf;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The table was computed and written to this path.
    Written(PathBuf),
    /// A table already existed at this path; nothing was read or written.
    Skipped(PathBuf),
}

/// Executes `config`.
///
/// Returns [`RunOutcome::Skipped`] without touching the filesystem when the
/// output path already exists. On failure nothing is written.
///
/// # Errors
///
/// [`PipelineError::InputMissing`] when an input file is absent, and the
/// wrapped subsystem error of whichever stage failed otherwise.
pub fn run(config: &PipelineConfig) -> Result<RunOutcome, PipelineError> {
    let output = config.output_path();
    if output.exists() {
        info!("Output {} already exists, skipping", output.display());
        return Ok(RunOutcome::Skipped(output));
    }
    config.validate()?;
    if let Some(missing) = config.inputs().into_iter().find(|p| !p.exists()) {
        return Err(PipelineError::InputMissing(missing.to_path_buf()));
    }

    let _run = StageTimer::start(format!("Run {}", output.display()));
    let mut table = compute_table(config)?;
    write_table(&mut table, &output, config.format)?;
    Ok(RunOutcome::Written(output))
}

/// Everything up to, but not including, the write.
pub fn compute_table(config: &PipelineConfig) -> Result<DataFrame, PipelineError> {
    let boundaries = {
        let _timer = StageTimer::start("Loading boundaries");
        load_boundaries(&config.boundaries, config.level)?
    };
    if boundaries.is_empty() {
        warn!(
            "No boundaries at level {} in {}",
            config.level,
            config.boundaries.display()
        );
    }

    let field = {
        let _timer = StageTimer::start("Loading concentration");
        let field = read_field(&config.concentration)?;
        match &config.time_slice {
            Some(window) => slice_time(&field, window)?,
            None => field,
        }
    };
    if field.time_len() == 0 {
        return Err(PipelineError::EmptyTimeAxis);
    }

    let field = {
        let _timer = StageTimer::start(format!("Resampling to {} buckets", config.bucket.code()));
        let averaged = resample_mean(&field, config.bucket)?;
        rescale(&averaged, config.rescale_factor)?
    };
    debug!(
        "Working grid is {}x{} with {} time steps",
        field.grid().width(),
        field.grid().height(),
        field.time_len()
    );

    let (zones, table) = {
        let _timer = StageTimer::start("Rasterizing zones");
        rasterize(&boundaries, field.grid())?
    };

    let schema = {
        let bands: Vec<String> = config.thresholds.bands().iter().map(|b| b.label()).collect();
        OutputSchema::new(config.bucket, &bands)
    };

    let mut zonal = {
        let _timer = StageTimer::start("Zonal statistics");
        zonal_statistics(config, &field, &zones)?
    };

    if config.bucket.is_classified() {
        let _timer = StageTimer::start("Classifying");
        add_categories(&mut zonal, &table)?;
    }

    let joined = join_metadata(zonal, &table, &boundaries)?;
    let finished = schema.finish(joined.lazy()).collect()?;
    Ok(schema.apply_layout(finished, config.layout)?)
}

/// Mean concentration per zone and time step, plus population bands and
/// their shares when the bucket carries population.
fn zonal_statistics(
    config: &PipelineConfig,
    field: &RasterField,
    zones: &ZoneRaster,
) -> Result<DataFrame, PipelineError> {
    let averages = pollution_average(field, zones)?;
    if !config.bucket.carries_population() {
        return Ok(averages);
    }

    let population = read_surface(&config.population)?;
    let population = align_surface(&population, field.grid(), Resampling::Sum)?;
    info!(
        "Population aligned to the working grid, {:.0} people in total",
        population.total()
    );
    let masks = build_masks(field, &config.thresholds);
    let bands = population_bands(&population, zones, &masks)?;

    let total = col(TOTAL_POPULATION);
    let shares: Vec<Expr> = masks
        .labels()
        .iter()
        .map(|label| {
            when(total.clone().gt(lit(0.0)))
                .then(col(affected_population_column(label).as_str()) / total.clone())
                .otherwise(lit(0.0))
                .alias(percentage_column(label))
        })
        .collect();

    let keys = [col(ZONE_CODE), col(TIME)];
    let frame = averages
        .lazy()
        .join(
            bands.lazy(),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(shares)
        .collect()?;
    Ok(frame)
}

/// Labels every mean on both scales. A zone without valid cells has a null
/// mean and gets no label; the mean itself is written as 0 once the schema
/// fills it, so the blank label is what marks such rows.
fn add_categories(frame: &mut DataFrame, table: &ZoneTable) -> Result<(), PipelineError> {
    let means = frame.column(MEAN)?.f64()?.clone();
    let zones = frame.column(ZONE_CODE)?.u32()?.clone();
    let mut eu: Vec<Option<&'static str>> = Vec::with_capacity(means.len());
    let mut who: Vec<Option<&'static str>> = Vec::with_capacity(means.len());

    for (row, mean) in means.into_iter().enumerate() {
        let Some(mean) = mean else {
            eu.push(None);
            who.push(None);
            continue;
        };
        let classes = classify(mean).map_err(|source| {
            let zone = zones
                .get(row)
                .and_then(|code| table.id_of(code))
                .unwrap_or_default()
                .to_string();
            let time = frame
                .column(TIME)
                .and_then(|c| c.get(row))
                .map(|v| v.to_string())
                .unwrap_or_default();
            PipelineError::Classify { zone, time, source }
        })?;
        eu.push(Some(classes.eu.label()));
        who.push(Some(classes.who.label()));
    }

    frame.with_column(Series::new(EU_CATEGORY.into(), eu))?;
    frame.with_column(Series::new(WHO_CATEGORY.into(), who))?;
    Ok(())
}

/// Maps zone codes back to identifiers through the correspondence table,
/// then attaches country and name by identifier. Rows whose code or
/// identifier has no match are dropped, as are boundaries that received no
/// cell.
fn join_metadata(
    frame: DataFrame,
    table: &ZoneTable,
    boundaries: &[Boundary],
) -> Result<DataFrame, PipelineError> {
    let (codes, ids): (Vec<u32>, Vec<&str>) = table.iter().unzip();
    let correspondence = df!(
        ZONE_CODE => codes,
        IDENTIFIER => ids,
    )?;
    let attributes = df!(
        IDENTIFIER => boundaries.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
        COUNTRY_CODE => boundaries.iter().map(|b| b.country.as_str()).collect::<Vec<_>>(),
        NAME => boundaries.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
    )?;

    let before = frame.height();
    let by_code = [col(ZONE_CODE)];
    let by_id = [col(IDENTIFIER)];
    let joined = frame
        .lazy()
        .join(
            correspondence.lazy(),
            by_code.clone(),
            by_code,
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            attributes.lazy(),
            by_id.clone(),
            by_id,
            JoinArgs::new(JoinType::Inner),
        )
        .sort_by_exprs([col(ZONE_CODE), col(TIME)], SortMultipleOptions::default())
        .collect()?;
    if joined.height() < before {
        debug!(
            "{} rows had no matching boundary and were dropped",
            before - joined.height()
        );
    }
    Ok(joined)
}
