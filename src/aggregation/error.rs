use crate::raster::error::RasterError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Thresholds must be finite, strictly ascending and non-empty, got {0:?}")]
    InvalidThresholds(Vec<f64>),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Failed to assemble aggregate table")]
    Polars(#[from] PolarsError),
}
