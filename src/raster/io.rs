//! Reading grids from disk, and the grid cache.
//!
//! Concentration products arrive as NetCDF (`.nc`, `.nc4`, `.netcdf`) and
//! population grids as GeoTIFF (`.tif`, `.tiff`). Everything else is read as
//! the cache container: a bincode-encoded [`RasterField`] or [`Surface`] tagged
//! with its kind. The cache keeps `NaN` no-data markers and the exact bits of
//! the axes, so a grid written and read back is the same grid.

use crate::raster::error::RasterError;
use crate::raster::field::{RasterField, Surface};
use crate::raster::geotiff::read_geotiff_surface;
use crate::utils::write_atomically;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

#[derive(Deserialize)]
enum GridContainer {
    Field(RasterField),
    Surface(Surface),
}

#[derive(Serialize)]
enum GridContainerRef<'a> {
    Field(&'a RasterField),
    Surface(&'a Surface),
}

impl GridContainer {
    fn kind(&self) -> &'static str {
        match self {
            GridContainer::Field(_) => "field",
            GridContainer::Surface(_) => "surface",
        }
    }
}

fn read_container(path: &Path) -> Result<GridContainer, RasterError> {
    let bytes = std::fs::read(path).map_err(|e| RasterError::Read(path.to_path_buf(), e))?;
    let (container, _) = bincode::serde::decode_from_slice::<GridContainer, _>(&bytes, BINCODE_CONFIG)
        .map_err(|e| RasterError::Decode(path.to_path_buf(), Box::from(e)))?;
    debug!("Read {} bytes of grid data from {}", bytes.len(), path.display());
    Ok(container)
}

fn write_container(container: GridContainerRef<'_>, path: &Path) -> Result<(), RasterError> {
    if GridFormat::of(path) != GridFormat::Container {
        return Err(RasterError::CacheExtension(path.to_path_buf()));
    }
    let bytes = bincode::serde::encode_to_vec(&container, BINCODE_CONFIG)
        .map_err(|e| RasterError::Encode(path.to_path_buf(), Box::new(e)))?;
    write_atomically(path, &bytes).map_err(|e| RasterError::Write(path.to_path_buf(), e))?;
    debug!("Wrote {} bytes of grid data to {}", bytes.len(), path.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridFormat {
    NetCdf,
    GeoTiff,
    Container,
}

impl GridFormat {
    fn of(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("nc" | "nc4" | "netcdf") => GridFormat::NetCdf,
            Some("tif" | "tiff") => GridFormat::GeoTiff,
            _ => GridFormat::Container,
        }
    }
}

#[cfg(feature = "netcdf")]
fn read_netcdf(path: &Path) -> Result<RasterField, RasterError> {
    crate::raster::netcdf_reader::read_netcdf_field(path)
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(path: &Path) -> Result<RasterField, RasterError> {
    Err(RasterError::MissingContent {
        path: path.to_path_buf(),
        what: "NetCDF support, the `netcdf` feature is disabled".to_string(),
    })
}

/// Reads a time-varying field, e.g. a concentration product.
pub fn read_field(path: &Path) -> Result<RasterField, RasterError> {
    match GridFormat::of(path) {
        GridFormat::NetCdf => return read_netcdf(path),
        GridFormat::GeoTiff => {
            return Err(RasterError::UnexpectedContent {
                path: path.to_path_buf(),
                expected: "field",
                found: "surface",
            })
        }
        GridFormat::Container => {}
    }
    match read_container(path)? {
        GridContainer::Field(field) => {
            let (grid, times, values) = field.into_parts();
            grid.validate()?;
            RasterField::new(grid, times, values)
        }
        other => Err(RasterError::UnexpectedContent {
            path: path.to_path_buf(),
            expected: "field",
            found: other.kind(),
        }),
    }
}

/// Reads a static surface, e.g. a population grid.
pub fn read_surface(path: &Path) -> Result<Surface, RasterError> {
    match GridFormat::of(path) {
        GridFormat::GeoTiff => return read_geotiff_surface(path),
        GridFormat::NetCdf => {
            return Err(RasterError::UnexpectedContent {
                path: path.to_path_buf(),
                expected: "surface",
                found: "field",
            })
        }
        GridFormat::Container => {}
    }
    match read_container(path)? {
        GridContainer::Surface(surface) => {
            surface.grid().validate()?;
            Surface::new(surface.grid().clone(), surface.values().to_vec())
        }
        other => Err(RasterError::UnexpectedContent {
            path: path.to_path_buf(),
            expected: "surface",
            found: other.kind(),
        }),
    }
}

pub fn write_field(field: &RasterField, path: &Path) -> Result<(), RasterError> {
    write_container(GridContainerRef::Field(field), path)
}

pub fn write_surface(surface: &Surface, path: &Path) -> Result<(), RasterError> {
    write_container(GridContainerRef::Surface(surface), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::{Axis, Crs, GridSpec};
    use chrono::NaiveDate;

    fn grid() -> GridSpec {
        GridSpec::new(
            Crs::wgs84(),
            Axis::regular("x", -10.05, 0.1, 3).unwrap(),
            Axis::regular("y", 60.05, -0.1, 2).unwrap(),
        )
    }

    #[test]
    fn test_field_survives_disk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pm2p5.grid");
        let t = NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let field = RasterField::new(grid(), vec![t], vec![1.0, f32::NAN, 3.0, 4.0, 5.0, 6.0])?;

        write_field(&field, &path)?;
        let read = read_field(&path)?;
        assert!(read.grid().same_grid(field.grid()));
        assert_eq!(read.times(), field.times());
        assert!(read.values()[1].is_nan());
        assert_eq!(read.values()[5], 6.0);
        Ok(())
    }

    #[test]
    fn test_kind_is_checked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("population.grid");
        write_surface(&Surface::filled(grid(), 2.0), &path)?;

        assert_eq!(read_surface(&path)?.total(), 12.0);
        assert!(matches!(
            read_field(&path),
            Err(RasterError::UnexpectedContent { found: "surface", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(GridFormat::of(Path::new("2022-pm2p5.NC")), GridFormat::NetCdf);
        assert_eq!(GridFormat::of(Path::new("reduced-2019.netcdf")), GridFormat::NetCdf);
        assert_eq!(GridFormat::of(Path::new("GHS_POP_4326.tif")), GridFormat::GeoTiff);
        assert_eq!(GridFormat::of(Path::new("pm2p5.grid")), GridFormat::Container);
        assert_eq!(GridFormat::of(Path::new("no-extension")), GridFormat::Container);
    }

    #[test]
    fn test_cache_refuses_source_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.nc");
        assert!(matches!(
            write_surface(&Surface::filled(grid(), 1.0), &path),
            Err(RasterError::CacheExtension(p)) if p == path
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_population_tiff_is_not_a_field() {
        assert!(matches!(
            read_field(Path::new("/nonexistent/population.tif")),
            Err(RasterError::UnexpectedContent { found: "surface", .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = read_surface(Path::new("/nonexistent/population.grid"));
        assert!(matches!(result, Err(RasterError::Read(p, _)) if p.ends_with("population.grid")));
    }
}
