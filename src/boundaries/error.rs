use crate::types::dataset::InvalidLevel;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("Failed to read boundary file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse boundary file '{0}' as GeoJSON")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode boundaries for '{0}'")]
    Encode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to write boundary file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Feature #{index} has no '{property}' property")]
    MissingProperty {
        index: usize,
        property: &'static str,
    },

    #[error("Boundary '{id}' has an invalid level")]
    Level {
        id: String,
        #[source]
        source: InvalidLevel,
    },

    #[error("Boundary '{id}' has unsupported geometry type '{kind}'")]
    UnsupportedGeometry { id: String, kind: String },

    #[error("Boundary '{id}' has malformed coordinates")]
    MalformedGeometry {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Boundary identifier '{0}' appears more than once at the same level")]
    DuplicateIdentifier(String),
}
