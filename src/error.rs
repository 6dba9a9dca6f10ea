use crate::aggregation::error::AggregationError;
use crate::boundaries::error::BoundaryError;
use crate::classify::ClassifyError;
use crate::pipeline::error::PipelineError;
use crate::raster::error::RasterError;
use crate::sampling::SamplingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExposureError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}
