//! Regular grid geometry: cell-center axes and the coordinate reference system
//! they are expressed in.
//!
//! Axes may run in either direction. Concentration products are usually
//! north-up, so their `y` axis descends while `x` ascends.

use crate::raster::error::RasterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Relative tolerance used when checking that an axis is regularly spaced.
const REGULARITY_TOLERANCE: f64 = 1e-6;

/// A coordinate reference system, identified by its authority code (e.g. `EPSG:4326`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(String);

impl Crs {
    pub fn new(code: impl AsRef<str>) -> Self {
        Crs(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Plain longitude/latitude on WGS84, the convention of every input product.
    pub fn wgs84() -> Self {
        Crs::new("EPSG:4326")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One regularly spaced grid axis, stored as cell-center coordinates.
///
/// Cell `i` covers `[center_i - step/2, center_i + step/2)` along the axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    coords: Vec<f64>,
    step: f64,
}

impl Axis {
    /// Builds an axis from explicit cell centers, checking that they are regularly spaced.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::AxisTooShort`] for fewer than two centers (use [`Axis::regular`]
    /// for single-cell axes), [`RasterError::DegenerateStep`] if two centers coincide and
    /// [`RasterError::IrregularAxis`] when spacing drifts beyond a relative 1e-6.
    pub fn new(name: &'static str, coords: Vec<f64>) -> Result<Self, RasterError> {
        if coords.len() < 2 {
            return Err(RasterError::AxisTooShort {
                axis: name,
                needed: 2,
                found: coords.len(),
            });
        }
        let step = coords[1] - coords[0];
        let axis = Axis { coords, step };
        axis.validate(name)?;
        Ok(axis)
    }

    /// Builds `len` centers starting at `first` and moving by `step`.
    pub fn regular(
        name: &'static str,
        first: f64,
        step: f64,
        len: usize,
    ) -> Result<Self, RasterError> {
        if len == 0 {
            return Err(RasterError::AxisTooShort {
                axis: name,
                needed: 1,
                found: 0,
            });
        }
        if !step.is_finite() || step == 0.0 {
            return Err(RasterError::DegenerateStep(name));
        }
        let coords = (0..len).map(|i| first + i as f64 * step).collect();
        Ok(Axis { coords, step })
    }

    /// Checks invariants again, e.g. after decoding an axis from disk.
    pub fn validate(&self, name: &'static str) -> Result<(), RasterError> {
        if self.coords.is_empty() {
            return Err(RasterError::AxisTooShort {
                axis: name,
                needed: 1,
                found: 0,
            });
        }
        if !self.step.is_finite() || self.step == 0.0 {
            return Err(RasterError::DegenerateStep(name));
        }
        let tolerance = self.step.abs() * REGULARITY_TOLERANCE;
        for (index, pair) in self.coords.windows(2).enumerate() {
            let found = pair[1] - pair[0];
            if (found - self.step).abs() > tolerance {
                return Err(RasterError::IrregularAxis {
                    axis: name,
                    expected: self.step,
                    found,
                    index: index + 1,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Signed distance between consecutive centers.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Outer edge of the first cell.
    fn origin(&self) -> f64 {
        self.coords[0] - self.step / 2.0
    }

    /// Continuous position of `value` in cell units; cell `i` spans `[i, i + 1)`.
    pub fn position(&self, value: f64) -> f64 {
        (value - self.origin()) / self.step
    }

    /// Index of the cell containing `value`, if any.
    pub fn index_of(&self, value: f64) -> Option<usize> {
        let position = self.position(value);
        if !position.is_finite() || position < 0.0 || position >= self.len() as f64 {
            return None;
        }
        Some(position.floor() as usize)
    }

    /// Lower and upper bound of cell `index`, in ascending order.
    pub fn cell_bounds(&self, index: usize) -> (f64, f64) {
        let half = self.step.abs() / 2.0;
        let center = self.coords[index];
        (center - half, center + half)
    }

    /// Lower and upper bound of the whole axis.
    pub fn extent(&self) -> (f64, f64) {
        let (first_lo, first_hi) = self.cell_bounds(0);
        let (last_lo, last_hi) = self.cell_bounds(self.len() - 1);
        (first_lo.min(last_lo), first_hi.max(last_hi))
    }

    /// Range of cell indices intersecting the interval `[lo, hi]`.
    pub fn overlapping(&self, lo: f64, hi: f64) -> Range<usize> {
        let a = self.position(lo);
        let b = self.position(hi);
        let start = a.min(b).floor().max(0.0);
        let end = a.max(b).ceil().min(self.len() as f64);
        if end <= start {
            return 0..0;
        }
        start as usize..end as usize
    }

    /// Bit-for-bit equality, stricter than `PartialEq` on floats for `-0.0`/`NaN`.
    pub fn identical(&self, other: &Axis) -> bool {
        self.step.to_bits() == other.step.to_bits()
            && self.coords.len() == other.coords.len()
            && self
                .coords
                .iter()
                .zip(&other.coords)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// The geometry shared by every raster in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: Crs,
    pub x: Axis,
    pub y: Axis,
}

impl GridSpec {
    pub fn new(crs: Crs, x: Axis, y: Axis) -> Self {
        Self { crs, x, y }
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        self.x.validate("x")?;
        self.y.validate("y")
    }

    pub fn width(&self) -> usize {
        self.x.len()
    }

    pub fn height(&self) -> usize {
        self.y.len()
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Center `(x, y)` of the cell at `row`, `col`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (self.x.coords()[col], self.y.coords()[row])
    }

    /// `(row, col)` of the cell containing the point, if inside the grid.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((self.y.index_of(y)?, self.x.index_of(x)?))
    }

    /// `(min_x, min_y, max_x, max_y)` of the covered area.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (min_x, max_x) = self.x.extent();
        let (min_y, max_y) = self.y.extent();
        (min_x, min_y, max_x, max_y)
    }

    pub fn overlaps(&self, other: &GridSpec) -> bool {
        let (a_min_x, a_min_y, a_max_x, a_max_y) = self.bounds();
        let (b_min_x, b_min_y, b_max_x, b_max_y) = other.bounds();
        a_min_x < b_max_x && b_min_x < a_max_x && a_min_y < b_max_y && b_min_y < a_max_y
    }

    /// Same CRS and bit-identical coordinate vectors.
    pub fn same_grid(&self, other: &GridSpec) -> bool {
        self.crs == other.crs && self.x.identical(&other.x) && self.y.identical(&other.y)
    }

    pub(crate) fn ensure_same(&self, other: &GridSpec, what: &str) -> Result<(), RasterError> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(RasterError::GridMismatch(format!(
                "{what}: {}x{} ({}) vs {}x{} ({})",
                self.width(),
                self.height(),
                self.crs,
                other.width(),
                other.height(),
                other.crs
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_of_ascending_axis() -> Result<(), RasterError> {
        let axis = Axis::new("x", vec![0.5, 1.5, 2.5])?;
        assert_eq!(axis.index_of(0.0), Some(0));
        assert_eq!(axis.index_of(1.0), Some(1)); // shared edge goes to the upper cell
        assert_eq!(axis.index_of(2.99), Some(2));
        assert_eq!(axis.index_of(3.0), None);
        assert_eq!(axis.index_of(-0.01), None);
        Ok(())
    }

    #[test]
    fn test_index_of_descending_axis() -> Result<(), RasterError> {
        let axis = Axis::new("y", vec![10.0, 9.0, 8.0])?;
        assert_eq!(axis.index_of(10.4), Some(0));
        assert_eq!(axis.index_of(9.0), Some(1));
        assert_eq!(axis.index_of(7.6), Some(2));
        assert_eq!(axis.index_of(7.4), None);
        assert_eq!(axis.extent(), (7.5, 10.5));
        Ok(())
    }

    #[test]
    fn test_irregular_axis_rejected() {
        let err = Axis::new("x", vec![0.0, 1.0, 2.5]).unwrap_err();
        assert!(matches!(err, RasterError::IrregularAxis { index: 2, .. }));
        assert!(matches!(
            Axis::new("x", vec![1.0]),
            Err(RasterError::AxisTooShort { .. })
        ));
        assert!(matches!(
            Axis::new("x", vec![1.0, 1.0]),
            Err(RasterError::DegenerateStep("x"))
        ));
    }

    #[test]
    fn test_overlapping_range() -> Result<(), RasterError> {
        let axis = Axis::regular("x", 0.5, 1.0, 4)?;
        assert_eq!(axis.overlapping(0.2, 1.7), 0..2);
        assert_eq!(axis.overlapping(1.0, 2.0), 1..2);
        assert_eq!(axis.overlapping(5.0, 6.0), 0..0);
        let descending = Axis::regular("y", 3.5, -1.0, 4)?;
        assert_eq!(descending.overlapping(3.2, 3.9), 0..1);
        Ok(())
    }

    #[test]
    fn test_same_grid_is_bitwise() -> Result<(), RasterError> {
        let a = GridSpec::new(
            Crs::wgs84(),
            Axis::regular("x", 0.05, 0.1, 3)?,
            Axis::regular("y", 0.25, -0.1, 2)?,
        );
        let mut b = a.clone();
        assert!(a.same_grid(&b));
        b.x = Axis::regular("x", 0.05 + 1e-9, 0.1, 3)?;
        assert!(!a.same_grid(&b));
        assert!(a.overlaps(&b));
        Ok(())
    }

    #[test]
    fn test_crs_normalized() {
        assert_eq!(Crs::new(" epsg:4326 "), Crs::wgs84());
        assert_eq!(Crs::default().as_str(), "EPSG:4326");
    }
}
