pub mod error;
pub mod masks;
pub mod zonal;
