use crate::raster::error::RasterError;
use crate::raster::grid::GridSpec;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A time series of grids, e.g. hourly PM2.5 concentration in µg/m³.
///
/// Values are laid out row-major per time step (`[t][y][x]`) and `NaN` marks
/// missing data. Time steps are kept sorted and unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterField {
    grid: GridSpec,
    times: Vec<NaiveDateTime>,
    values: Vec<f32>,
}

impl RasterField {
    /// Wraps a value buffer, sorting time steps if they arrive out of order.
    ///
    /// # Errors
    ///
    /// [`RasterError::ShapeMismatch`] if `values` is not `times × height × width` long,
    /// [`RasterError::DuplicateTimeStep`] if a time step occurs twice.
    pub fn new(
        grid: GridSpec,
        times: Vec<NaiveDateTime>,
        values: Vec<f32>,
    ) -> Result<Self, RasterError> {
        let layer = grid.cell_count();
        let expected = layer * times.len();
        if values.len() != expected {
            return Err(RasterError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }

        let field = if times.windows(2).all(|w| w[0] < w[1]) {
            RasterField {
                grid,
                times,
                values,
            }
        } else {
            let mut order: Vec<usize> = (0..times.len()).collect();
            order.sort_by_key(|&i| times[i]);
            if let Some(pair) = order.windows(2).find(|w| times[w[0]] == times[w[1]]) {
                return Err(RasterError::DuplicateTimeStep(times[pair[0]]));
            }
            let mut sorted = Vec::with_capacity(values.len());
            for &i in &order {
                sorted.extend_from_slice(&values[i * layer..(i + 1) * layer]);
            }
            RasterField {
                grid,
                times: order.iter().map(|&i| times[i]).collect(),
                values: sorted,
            }
        };
        Ok(field)
    }

    /// Builds a field from one buffer per time step.
    pub fn from_layers(
        grid: GridSpec,
        layers: Vec<(NaiveDateTime, Vec<f32>)>,
    ) -> Result<Self, RasterError> {
        let layer = grid.cell_count();
        let mut times = Vec::with_capacity(layers.len());
        let mut values = Vec::with_capacity(layer * layers.len());
        for (time, data) in layers {
            if data.len() != layer {
                return Err(RasterError::ShapeMismatch {
                    expected: layer,
                    found: data.len(),
                });
            }
            times.push(time);
            values.extend(data);
        }
        RasterField::new(grid, times, values)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn time_len(&self) -> usize {
        self.times.len()
    }

    pub fn layer(&self, t: usize) -> &[f32] {
        let len = self.grid.cell_count();
        &self.values[t * len..(t + 1) * len]
    }

    /// Iterates `(time, layer)` pairs in time order.
    pub fn layers(&self) -> impl Iterator<Item = (NaiveDateTime, &[f32])> + '_ {
        let len = self.grid.cell_count().max(1);
        self.times.iter().copied().zip(self.values.chunks(len))
    }

    pub fn get(&self, t: usize, row: usize, col: usize) -> f32 {
        self.layer(t)[row * self.grid.width() + col]
    }

    pub fn into_parts(self) -> (GridSpec, Vec<NaiveDateTime>, Vec<f32>) {
        (self.grid, self.times, self.values)
    }
}

/// A single static grid, e.g. residents per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    grid: GridSpec,
    values: Vec<f32>,
}

impl Surface {
    pub fn new(grid: GridSpec, values: Vec<f32>) -> Result<Self, RasterError> {
        let expected = grid.cell_count();
        if values.len() != expected {
            return Err(RasterError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Surface { grid, values })
    }

    pub fn filled(grid: GridSpec, value: f32) -> Self {
        let values = vec![value; grid.cell_count()];
        Surface { grid, values }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.grid.width() + col]
    }

    /// Sum over all cells, skipping `NaN`.
    pub fn total(&self) -> f64 {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|&v| v as f64)
            .sum()
    }
}
