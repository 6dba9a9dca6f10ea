pub mod align;
pub mod error;
pub mod field;
pub mod geotiff;
pub mod grid;
pub mod interpolation;
pub mod io;
#[cfg(feature = "netcdf")]
pub mod netcdf_reader;
pub mod temporal;
