//! Pre-processing of downloaded concentration grids before they enter a run.
//!
//! Downloads arrive as one file per year, and the yearly grids of a product do
//! not always agree to the last bit on their coordinates. Merging aligns every
//! file onto one reference grid and stacks the time steps.

use crate::raster::align::{align_field, normalize_longitudes, Resampling};
use crate::raster::error::RasterError;
use crate::raster::field::RasterField;
use crate::raster::temporal::resample_mean;
use crate::types::time_bucket::TimeBucket;
use log::info;

/// Aligns each of `others` onto the grid of `reference` and concatenates all
/// time steps, sorted by time. Longitudes given as 0..360 are moved to
/// -180..180 first.
///
/// # Errors
///
/// [`RasterError::DuplicateTimeStep`] if two inputs share a time step, and
/// [`RasterError::CrsMismatch`] if an input uses another reference system.
pub fn merge_onto_reference(
    reference: RasterField,
    others: Vec<RasterField>,
    method: Resampling,
) -> Result<RasterField, RasterError> {
    let reference = normalize_longitudes(reference)?;
    let grid = reference.grid().clone();
    let mut layers: Vec<_> = reference
        .layers()
        .map(|(time, layer)| (time, layer.to_vec()))
        .collect();

    for other in others {
        let aligned = align_field(&normalize_longitudes(other)?, &grid, method)?;
        layers.extend(aligned.layers().map(|(time, layer)| (time, layer.to_vec())));
    }

    let merged = RasterField::from_layers(grid, layers)?;
    info!(
        "Merged {} time steps onto a {}x{} reference grid",
        merged.time_len(),
        merged.grid().width(),
        merged.grid().height()
    );
    Ok(merged)
}

/// Reduces an hourly field to daily means.
pub fn reduce_daily(field: &RasterField) -> Result<RasterField, RasterError> {
    resample_mean(field, TimeBucket::Day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::{Axis, Crs, GridSpec};
    use chrono::{NaiveDate, NaiveDateTime};

    fn grid(x0: f64) -> GridSpec {
        GridSpec::new(
            Crs::wgs84(),
            Axis::regular("x", x0, 1.0, 2).unwrap(),
            Axis::regular("y", 0.5, 1.0, 1).unwrap(),
        )
    }

    fn at(year: i32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_merge_copies_reference_coordinates() -> Result<(), RasterError> {
        let reference = RasterField::new(grid(0.5), vec![at(2019, 0)], vec![1.0, 2.0])?;
        // drifted coordinates of the same cells, delivered out of order
        let drifted = RasterField::new(
            grid(0.5 + 1e-7),
            vec![at(2018, 0)],
            vec![3.0, 4.0],
        )?;

        let merged = merge_onto_reference(reference, vec![drifted], Resampling::Nearest)?;
        assert_eq!(merged.times(), &[at(2018, 0), at(2019, 0)]);
        assert!(merged.grid().same_grid(&grid(0.5)));
        assert_eq!(merged.values(), &[3.0, 4.0, 1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_merge_rejects_shared_time_steps() -> Result<(), RasterError> {
        let a = RasterField::new(grid(0.5), vec![at(2019, 0)], vec![1.0, 2.0])?;
        let b = RasterField::new(grid(0.5), vec![at(2019, 0)], vec![3.0, 4.0])?;
        assert!(matches!(
            merge_onto_reference(a, vec![b], Resampling::Nearest),
            Err(RasterError::DuplicateTimeStep(t)) if t == at(2019, 0)
        ));
        Ok(())
    }

    #[test]
    fn test_reduce_daily() -> Result<(), RasterError> {
        let hourly = RasterField::new(
            grid(0.5),
            vec![at(2019, 0), at(2019, 1), at(2019, 23)],
            vec![1.0, f32::NAN, 2.0, 4.0, 3.0, f32::NAN],
        )?;
        let daily = reduce_daily(&hourly)?;
        assert_eq!(daily.time_len(), 1);
        assert_eq!(daily.values(), &[2.0, 4.0]);
        Ok(())
    }
}
