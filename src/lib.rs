mod aggregation;
mod boundaries;
mod classify;
mod error;
mod pipeline;
mod prepare;
mod raster;
mod sampling;
mod schema;
mod types;
mod utils;
mod zones;

pub use error::ExposureError;
pub use utils::StageTimer;

pub use types::dataset::{AdminLevel, DatasetSource, InvalidLevel};
pub use types::time_bucket::{TimeBucket, TimeSlice};

pub use raster::align::{
    align_field, align_surface, normalize_longitudes, rescale, rescaled_grid, Resampling,
};
pub use raster::error::RasterError;
pub use raster::field::{RasterField, Surface};
pub use raster::grid::{Axis, Crs, GridSpec};
pub use raster::interpolation::{bilinear_interpolate, nearest_interpolate};
pub use raster::geotiff::read_geotiff_surface;
pub use raster::io::{read_field, read_surface, write_field, write_surface};
#[cfg(feature = "netcdf")]
pub use raster::netcdf_reader::{read_netcdf_field, CONCENTRATION_VARIABLES};
pub use raster::temporal::{resample_mean, slice_time};

pub use boundaries::boundary::{country_prefix, filter_level, Boundary, NUTS_COUNTRY_PREFIX};
pub use boundaries::error::BoundaryError;
pub use boundaries::geojson::{load_boundaries, read_boundaries, write_geojson};
pub use boundaries::harmonize::{
    harmonize, harmonize_files, TerritoryLayer, KEPT_NUTS_LEVELS, TERRITORY_COUNTRY_PREFIX,
};

pub use zones::rasterizer::{rasterize, ZoneRaster, ZoneTable};

pub use aggregation::error::AggregationError;
pub use aggregation::masks::{
    build_masks, Band, MaskSet, ThresholdMask, Thresholds, DEFAULT_THRESHOLDS,
};
pub use aggregation::zonal::{pollution_average, population_bands};

pub use classify::{classify, Classification, ClassifyError, EuCategory, WhoCategory, DOMAIN_MAX};

pub use schema::{ColumnKind, Layout, OutputColumn, OutputSchema};

pub use pipeline::config::{OutputFormat, PipelineConfig, RunPlan, DEFAULT_RESCALE_FACTOR};
pub use pipeline::error::PipelineError;
pub use pipeline::orchestrator::{compute_table, run, RunOutcome};
pub use pipeline::writer::write_table;

pub use prepare::{merge_onto_reference, reduce_daily};
pub use sampling::{largest_per_country, read_points, sample_points, SamplePoint, SamplingError};
