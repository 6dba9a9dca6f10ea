//! Partitions concentration values into bands and marks, per band, the cells
//! falling inside it.

use crate::aggregation::error::AggregationError;
use crate::raster::field::RasterField;
use crate::raster::grid::GridSpec;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default band edges in µg/m³.
pub const DEFAULT_THRESHOLDS: [f64; 6] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0];

/// Ascending band edges. Each edge opens a band that runs up to the next
/// edge; the last band is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Thresholds(Vec<f64>);

impl Thresholds {
    pub fn new(edges: Vec<f64>) -> Result<Self, AggregationError> {
        let valid = !edges.is_empty()
            && edges.iter().all(|e| e.is_finite())
            && edges.windows(2).all(|w| w[0] < w[1]);
        if valid {
            Ok(Thresholds(edges))
        } else {
            Err(AggregationError::InvalidThresholds(edges))
        }
    }

    pub fn edges(&self) -> &[f64] {
        &self.0
    }

    /// The bands in ascending order.
    pub fn bands(&self) -> Vec<Band> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &lower)| Band {
                lower,
                upper: self.0.get(i + 1).copied(),
            })
            .collect()
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds(DEFAULT_THRESHOLDS.to_vec())
    }
}

impl TryFrom<Vec<f64>> for Thresholds {
    type Error = AggregationError;

    fn try_from(edges: Vec<f64>) -> Result<Self, Self::Error> {
        Thresholds::new(edges)
    }
}

impl From<Thresholds> for Vec<f64> {
    fn from(thresholds: Thresholds) -> Self {
        thresholds.0
    }
}

/// The half-open interval `[lower, upper)`, or `[lower, ∞)` for the last band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub lower: f64,
    pub upper: Option<f64>,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && self.upper.map_or(true, |upper| value < upper)
    }

    /// `"10-15"` for bounded bands, `"25+"` for the last one.
    pub fn label(&self) -> String {
        match self.upper {
            Some(upper) => format!("{}-{}", edge(self.lower), edge(upper)),
            None => format!("{}+", edge(self.lower)),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn edge(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Cells of a field whose value falls inside one band, laid out like the field.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdMask {
    band: Band,
    cells: Vec<bool>,
}

impl ThresholdMask {
    pub fn band(&self) -> &Band {
        &self.band
    }

    pub fn label(&self) -> String {
        self.band.label()
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn is_set(&self, t: usize, cell: usize, layer_len: usize) -> bool {
        self.cells[t * layer_len + cell]
    }
}

/// One mask per band over the same grid and time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSet {
    grid: GridSpec,
    times: Vec<NaiveDateTime>,
    masks: Vec<ThresholdMask>,
}

impl MaskSet {
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn masks(&self) -> &[ThresholdMask] {
        &self.masks
    }

    pub fn labels(&self) -> Vec<String> {
        self.masks.iter().map(ThresholdMask::label).collect()
    }
}

/// Builds one mask per band of `thresholds` over `field`.
///
/// No-data cells are false in every mask. Values below the first edge are not
/// physical concentrations and fall in no band either.
pub fn build_masks(field: &RasterField, thresholds: &Thresholds) -> MaskSet {
    let masks = thresholds
        .bands()
        .into_iter()
        .map(|band| ThresholdMask {
            band,
            cells: field
                .values()
                .iter()
                .map(|&v| !v.is_nan() && band.contains(v as f64))
                .collect(),
        })
        .collect();
    MaskSet {
        grid: field.grid().clone(),
        times: field.times().to_vec(),
        masks,
    }
}
