use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Axis '{axis}' needs at least {needed} coordinates, got {found}")]
    AxisTooShort {
        axis: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("Axis '{axis}' is not regularly spaced (step {expected} vs {found} at index {index})")]
    IrregularAxis {
        axis: &'static str,
        expected: f64,
        found: f64,
        index: usize,
    },

    #[error("Axis '{0}' has a zero or non-finite step")]
    DegenerateStep(&'static str),

    #[error("Value buffer holds {found} cells but the grid shape requires {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Coordinate reference systems differ: source {source_crs}, target {target_crs}")]
    CrsMismatch {
        source_crs: String,
        target_crs: String,
    },

    #[error("Rasters are not aligned on the same grid: {0}")]
    GridMismatch(String),

    #[error("Zone code {code} is outside the table of {zone_count} zones")]
    InvalidZoneCode { code: u32, zone_count: usize },

    #[error("Rescale factor must be positive and finite, got {0}")]
    InvalidRescaleFactor(f64),

    #[error("Time step {0} appears in more than one field")]
    DuplicateTimeStep(chrono::NaiveDateTime),

    #[error("Grid file '{path}' holds a {found}, expected a {expected}")]
    UnexpectedContent {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Failed to read grid file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write grid file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode grid file '{0}'")]
    Decode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode grid for '{0}'")]
    Encode(PathBuf, #[source] Box<bincode::error::EncodeError>),

    #[error("Grid cache '{0}' must not use a NetCDF or GeoTIFF extension")]
    CacheExtension(PathBuf),

    #[cfg(feature = "netcdf")]
    #[error("Failed to read NetCDF file '{0}'")]
    NetCdf(PathBuf, #[source] netcdf::Error),

    #[error("Failed to read GeoTIFF file '{0}'")]
    Tiff(PathBuf, #[source] tiff::TiffError),

    #[error("Grid file '{path}' has no {what}")]
    MissingContent { path: PathBuf, what: String },

    #[error("Variable '{variable}' of '{path}' has dimensions {dimensions:?}, expected (time, ..., y, x)")]
    UnexpectedLayout {
        path: PathBuf,
        variable: String,
        dimensions: Vec<String>,
    },

    #[error("Time units '{units}' of '{path}' are not understood")]
    TimeUnits { path: PathBuf, units: String },

    #[error("Unsupported coordinate reference system in '{path}': {description}")]
    UnsupportedCrs { path: PathBuf, description: String },
}
