pub mod boundary;
pub mod error;
pub mod geojson;
pub mod harmonize;
