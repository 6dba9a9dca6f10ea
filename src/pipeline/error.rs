use crate::aggregation::error::AggregationError;
use crate::boundaries::error::BoundaryError;
use crate::classify::ClassifyError;
use crate::raster::error::RasterError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Required input file '{0}' does not exist")]
    InputMissing(PathBuf),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read run plan '{0}'")]
    PlanRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse run plan '{0}'")]
    PlanParse(PathBuf, #[source] serde_json::Error),

    #[error("No time steps left in the concentration field after slicing")]
    EmptyTimeAxis,

    #[error("Failed to classify the mean of zone '{zone}' at {time}")]
    Classify {
        zone: String,
        time: String,
        #[source]
        source: ClassifyError,
    },

    #[error("Failed to create output directory '{0}'")]
    OutputDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing output file '{0}'")]
    OutputWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing output file '{0}'")]
    OutputWritePolars(PathBuf, #[source] PolarsError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Failed to assemble output table")]
    Polars(#[from] PolarsError),
}
