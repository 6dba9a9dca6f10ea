//! Moves rasters onto a target grid.
//!
//! The result always carries a clone of the target's [`GridSpec`], so rasters
//! aligned to the same target compare bit-identical and can be combined cell by
//! cell without any coordinate tolerance.

use crate::raster::error::RasterError;
use crate::raster::field::{RasterField, Surface};
use crate::raster::grid::{Axis, GridSpec};
use crate::raster::interpolation::{bilinear_interpolate, nearest_interpolate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Overlaps thinner than this fraction of a source cell are ignored.
const MIN_OVERLAP: f64 = 1e-9;

/// How values are carried from source cells to target cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Value of the source cell containing the target center. For densities.
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding source centers. For densities.
    Bilinear,
    /// Area-weighted sum. For counts such as population, whose totals must
    /// survive a change of resolution.
    Sum,
}

enum Plan {
    Identity,
    Disjoint,
    Resample,
}

fn plan(source: &GridSpec, target: &GridSpec) -> Result<Plan, RasterError> {
    if source.crs != target.crs {
        return Err(RasterError::CrsMismatch {
            source_crs: source.crs.to_string(),
            target_crs: target.crs.to_string(),
        });
    }
    if source.same_grid(target) {
        return Ok(Plan::Identity);
    }
    if !source.overlaps(target) {
        warn!(
            "Source grid {:?} does not overlap target grid {:?}, result is all no-data",
            source.bounds(),
            target.bounds()
        );
        return Ok(Plan::Disjoint);
    }
    Ok(Plan::Resample)
}

/// Resamples every time step of `source` onto `target`.
///
/// # Errors
///
/// [`RasterError::CrsMismatch`] if the two grids use different reference systems.
pub fn align_field(
    source: &RasterField,
    target: &GridSpec,
    method: Resampling,
) -> Result<RasterField, RasterError> {
    let values = match plan(source.grid(), target)? {
        Plan::Identity => source.values().to_vec(),
        Plan::Disjoint => vec![f32::NAN; target.cell_count() * source.time_len()],
        Plan::Resample => {
            let resampler = Resampler::new(source.grid(), target, method);
            let mut values = Vec::with_capacity(target.cell_count() * source.time_len());
            for (_, layer) in source.layers() {
                values.extend(resampler.apply(layer));
            }
            values
        }
    };
    RasterField::new(target.clone(), source.times().to_vec(), values)
}

/// Resamples a static surface onto `target`.
pub fn align_surface(
    source: &Surface,
    target: &GridSpec,
    method: Resampling,
) -> Result<Surface, RasterError> {
    let values = match plan(source.grid(), target)? {
        Plan::Identity => source.values().to_vec(),
        Plan::Disjoint => vec![f32::NAN; target.cell_count()],
        Plan::Resample => Resampler::new(source.grid(), target, method).apply(source.values()),
    };
    if method == Resampling::Sum {
        let after: f64 = values.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).sum();
        debug!(
            "Sum resampling kept {after:.1} of {:.1} counted units",
            source.total()
        );
    }
    Surface::new(target.clone(), values)
}

/// Precomputed source lookups for one source/target grid pair.
enum Resampler<'a> {
    Point {
        source: &'a GridSpec,
        xs: Vec<f64>,
        ys: Vec<f64>,
        bilinear: bool,
    },
    Sum {
        source: &'a GridSpec,
        x_weights: Vec<Vec<(usize, f64)>>,
        y_weights: Vec<Vec<(usize, f64)>>,
    },
}

impl<'a> Resampler<'a> {
    fn new(source: &'a GridSpec, target: &GridSpec, method: Resampling) -> Self {
        match method {
            Resampling::Nearest | Resampling::Bilinear => Resampler::Point {
                source,
                xs: center_positions(&source.x, &target.x),
                ys: center_positions(&source.y, &target.y),
                bilinear: method == Resampling::Bilinear,
            },
            Resampling::Sum => Resampler::Sum {
                source,
                x_weights: overlap_weights(&source.x, &target.x),
                y_weights: overlap_weights(&source.y, &target.y),
            },
        }
    }

    fn apply(&self, data: &[f32]) -> Vec<f32> {
        match self {
            Resampler::Point {
                source,
                xs,
                ys,
                bilinear,
            } => {
                let (width, height) = (source.width(), source.height());
                let mut out = Vec::with_capacity(xs.len() * ys.len());
                for &y in ys {
                    for &x in xs {
                        out.push(if *bilinear {
                            bilinear_interpolate(data, width, height, x, y)
                        } else {
                            nearest_interpolate(data, width, height, x, y)
                        });
                    }
                }
                out
            }
            Resampler::Sum {
                source,
                x_weights,
                y_weights,
            } => {
                let width = source.width();
                let mut out = Vec::with_capacity(x_weights.len() * y_weights.len());
                for rows in y_weights {
                    for cols in x_weights {
                        let mut total = 0.0f64;
                        let mut touched = false;
                        for &(row, wy) in rows {
                            for &(col, wx) in cols {
                                let value = data[row * width + col];
                                if !value.is_nan() {
                                    total += value as f64 * wx * wy;
                                    touched = true;
                                }
                            }
                        }
                        out.push(if touched { total as f32 } else { f32::NAN });
                    }
                }
                out
            }
        }
    }
}

/// Target centers expressed as fractional source center indices.
fn center_positions(source: &Axis, target: &Axis) -> Vec<f64> {
    target
        .coords()
        .iter()
        .map(|&c| source.position(c) - 0.5)
        .collect()
}

/// For each target cell, the source cells it overlaps and the share of each
/// source cell that falls inside it.
fn overlap_weights(source: &Axis, target: &Axis) -> Vec<Vec<(usize, f64)>> {
    let source_width = source.step().abs();
    (0..target.len())
        .map(|i| {
            let (lo, hi) = target.cell_bounds(i);
            source
                .overlapping(lo, hi)
                .filter_map(|j| {
                    let (s_lo, s_hi) = source.cell_bounds(j);
                    let share = (hi.min(s_hi) - lo.max(s_lo)) / source_width;
                    (share > MIN_OVERLAP).then_some((j, share))
                })
                .collect()
        })
        .collect()
}

/// Grid with the same extent as `grid` and `floor(n × factor)` cells per axis.
pub fn rescaled_grid(grid: &GridSpec, factor: f64) -> Result<GridSpec, RasterError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(RasterError::InvalidRescaleFactor(factor));
    }
    let scale = |axis: &Axis, name: &'static str| -> Result<Axis, RasterError> {
        let len = ((axis.len() as f64 * factor).floor() as usize).max(1);
        let step = axis.step() * axis.len() as f64 / len as f64;
        let origin = axis.coords()[0] - axis.step() / 2.0;
        Axis::regular(name, origin + step / 2.0, step, len)
    };
    Ok(GridSpec::new(
        grid.crs.clone(),
        scale(&grid.x, "x")?,
        scale(&grid.y, "y")?,
    ))
}

/// Changes the resolution of `field` while keeping its extent, using nearest
/// resampling. A factor of 3 turns every cell into a 3×3 block.
pub fn rescale(field: &RasterField, factor: f64) -> Result<RasterField, RasterError> {
    if factor == 1.0 {
        return Ok(field.clone());
    }
    let target = rescaled_grid(field.grid(), factor)?;
    debug!(
        "Rescaling {}x{} grid to {}x{}",
        field.grid().width(),
        field.grid().height(),
        target.width(),
        target.height()
    );
    align_field(field, &target, Resampling::Nearest)
}

/// Maps a 0..360 longitude axis to -180..180 and reorders columns so that
/// `x` stays ascending. Fields already in -180..180 are returned as is.
pub fn normalize_longitudes(field: RasterField) -> Result<RasterField, RasterError> {
    if field.grid().x.coords().iter().all(|&x| x <= 180.0) {
        return Ok(field);
    }
    let (grid, times, values) = field.into_parts();
    let width = grid.width();

    let wrapped: Vec<f64> = grid
        .x
        .coords()
        .iter()
        .map(|&x| (x + 180.0).rem_euclid(360.0) - 180.0)
        .collect();
    let mut order: Vec<usize> = (0..width).collect();
    order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
    let sorted: Vec<f64> = order.iter().map(|&i| wrapped[i]).collect();

    let x = if sorted.len() >= 2 {
        Axis::new("x", sorted)?
    } else {
        Axis::regular("x", sorted[0], grid.x.step().abs(), 1)?
    };

    let mut reordered = Vec::with_capacity(values.len());
    for row in values.chunks(width) {
        reordered.extend(order.iter().map(|&i| row[i]));
    }
    RasterField::new(GridSpec::new(grid.crs, x, grid.y), times, reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::Crs;
    use chrono::NaiveDate;

    fn grid(x0: f64, dx: f64, w: usize, y0: f64, dy: f64, h: usize) -> GridSpec {
        GridSpec::new(
            Crs::wgs84(),
            Axis::regular("x", x0, dx, w).unwrap(),
            Axis::regular("y", y0, dy, h).unwrap(),
        )
    }

    fn single_step(grid: GridSpec, values: Vec<f32>) -> RasterField {
        let t = NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RasterField::new(grid, vec![t], values).unwrap()
    }

    #[test]
    fn test_align_to_own_grid_is_identity() -> Result<(), RasterError> {
        let g = grid(0.5, 1.0, 2, 1.5, -1.0, 2);
        let field = single_step(g.clone(), vec![1.0, f32::NAN, 3.0, 4.0]);
        for method in [Resampling::Nearest, Resampling::Bilinear, Resampling::Sum] {
            let aligned = align_field(&field, &g, method)?;
            assert_eq!(aligned.values()[0], 1.0);
            assert!(aligned.values()[1].is_nan());
            assert_eq!(&aligned.values()[2..], &[3.0, 4.0]);
        }
        Ok(())
    }

    #[test]
    fn test_sum_conserves_population() -> Result<(), RasterError> {
        // 4x4 cells of size 0.5 onto 2x2 cells of size 1.0 over the same extent
        let fine = grid(0.25, 0.5, 4, 1.75, -0.5, 4);
        let coarse = grid(0.5, 1.0, 2, 1.5, -1.0, 2);
        let values: Vec<f32> = (1..=16).map(|v| v as f32).collect();
        let surface = Surface::new(fine, values)?;

        let aligned = align_surface(&surface, &coarse, Resampling::Sum)?;
        assert_eq!(aligned.values(), &[14.0, 22.0, 46.0, 54.0]);
        assert_eq!(aligned.total(), surface.total());
        Ok(())
    }

    #[test]
    fn test_sum_splits_cells_across_targets() -> Result<(), RasterError> {
        // one cell of width 2 split over two targets of width 1
        let source = grid(1.0, 2.0, 1, 0.5, -1.0, 1);
        let target = grid(0.5, 1.0, 2, 0.5, -1.0, 1);
        let aligned = align_surface(&Surface::new(source, vec![100.0])?, &target, Resampling::Sum)?;
        assert_eq!(aligned.values(), &[50.0, 50.0]);
        Ok(())
    }

    #[test]
    fn test_result_carries_target_coordinates() -> Result<(), RasterError> {
        let source = grid(0.0, 0.3, 10, 3.0, -0.3, 10);
        let target = grid(0.05, 0.1, 20, 2.95, -0.1, 20);
        let field = single_step(source, vec![7.0; 100]);
        let aligned = align_field(&field, &target, Resampling::Bilinear)?;
        assert!(aligned.grid().same_grid(&target));
        assert_eq!(aligned.values().len(), 400);
        Ok(())
    }

    #[test]
    fn test_disjoint_grids_give_no_data() -> Result<(), RasterError> {
        let source = grid(0.5, 1.0, 2, 1.5, -1.0, 2);
        let target = grid(50.5, 1.0, 2, 40.5, -1.0, 2);
        let aligned = align_surface(
            &Surface::new(source, vec![0.0; 4])?,
            &target,
            Resampling::Sum,
        )?;
        assert!(aligned.values().iter().all(|v| v.is_nan()));
        Ok(())
    }

    #[test]
    fn test_untouched_target_cells_are_no_data() -> Result<(), RasterError> {
        let source = grid(0.5, 1.0, 1, 0.5, -1.0, 1);
        let target = grid(0.5, 1.0, 3, 0.5, -1.0, 1);
        let aligned = align_surface(&Surface::new(source, vec![0.0])?, &target, Resampling::Sum)?;
        assert_eq!(aligned.values()[0], 0.0);
        assert!(aligned.values()[1].is_nan());
        assert!(aligned.values()[2].is_nan());
        Ok(())
    }

    #[test]
    fn test_crs_mismatch_is_an_error() {
        let source = grid(0.5, 1.0, 2, 1.5, -1.0, 2);
        let mut target = source.clone();
        target.crs = Crs::new("EPSG:3035");
        let result = align_surface(&Surface::filled(source, 1.0), &target, Resampling::Nearest);
        assert!(matches!(result, Err(RasterError::CrsMismatch { .. })));
    }

    #[test]
    fn test_rescale_by_three() -> Result<(), RasterError> {
        let g = grid(0.5, 1.0, 2, 1.5, -1.0, 2);
        let field = single_step(g, vec![1.0, 2.0, 3.0, 4.0]);
        let rescaled = rescale(&field, 3.0)?;
        assert_eq!(rescaled.grid().width(), 6);
        assert_eq!(rescaled.grid().height(), 6);
        let (min_x, min_y, max_x, max_y) = rescaled.grid().bounds();
        assert!(min_x.abs() < 1e-9 && min_y.abs() < 1e-9);
        assert!((max_x - 2.0).abs() < 1e-9 && (max_y - 2.0).abs() < 1e-9);
        // top-left 3x3 block copies the top-left source cell
        assert_eq!(rescaled.get(0, 2, 2), 1.0);
        assert_eq!(rescaled.get(0, 0, 3), 2.0);
        assert_eq!(rescaled.get(0, 5, 5), 4.0);

        assert_eq!(rescale(&field, 1.0)?, field);
        assert!(matches!(
            rescale(&field, 0.0),
            Err(RasterError::InvalidRescaleFactor(_))
        ));
        Ok(())
    }

    #[test]
    fn test_normalize_longitudes() -> Result<(), RasterError> {
        let g = grid(0.0, 90.0, 4, 0.0, -1.0, 1);
        let field = single_step(g, vec![0.0, 90.0, 180.0, 270.0]);
        let normalized = normalize_longitudes(field)?;
        assert_eq!(normalized.grid().x.coords(), &[-180.0, -90.0, 0.0, 90.0]);
        assert_eq!(normalized.values(), &[180.0, 270.0, 0.0, 90.0]);
        Ok(())
    }
}
