//! Population surfaces from single-band GeoTIFF files such as the GHSL grids.
//!
//! Only north-up rasters georeferenced by a pixel scale and one tie point are
//! supported. The CRS comes from the GeoKey directory and must carry an EPSG code.

use crate::raster::error::RasterError;
use crate::raster::field::Surface;
use crate::raster::grid::{Axis, Crs, GridSpec};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Inline values of the GeoKey directory, keyed by key id.
fn geo_key(directory: &[u16], key: u16) -> Option<u16> {
    directory
        .get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

fn epsg_of(directory: &[u16]) -> Option<u16> {
    [PROJECTED_CS_TYPE_KEY, GEOGRAPHIC_TYPE_KEY]
        .into_iter()
        .filter_map(|key| geo_key(directory, key))
        .find(|code| *code != USER_DEFINED)
}

fn widen(image: DecodingResult) -> Option<Vec<f32>> {
    Some(match image {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return None,
    })
}

pub fn read_geotiff_surface(path: &Path) -> Result<Surface, RasterError> {
    let tiff_error = |e| RasterError::Tiff(path.to_path_buf(), e);
    let file = File::open(path).map_err(|e| RasterError::Read(path.to_path_buf(), e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_error)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_error)?;
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(tiff_error)?;
    let tie_point = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(tiff_error)?;
    let (&[sx, sy, ..], &[i, j, _, x, y, ..]) = (scale.as_slice(), tie_point.as_slice()) else {
        return Err(RasterError::MissingContent {
            path: path.to_path_buf(),
            what: "pixel scale and tie point".to_string(),
        });
    };

    let keys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(tiff_error)?
        .map(|value| value.into_u16_vec())
        .transpose()
        .map_err(tiff_error)?
        .unwrap_or_default();
    let epsg = epsg_of(&keys).ok_or_else(|| RasterError::UnsupportedCrs {
        path: path.to_path_buf(),
        description: "GeoTIFF without an EPSG code".to_string(),
    })?;
    // tie point on the cell corner unless the raster declares point pixels
    let half = if geo_key(&keys, GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT) {
        0.0
    } else {
        0.5
    };

    let nodata = decoder
        .find_tag(Tag::GdalNodata)
        .map_err(tiff_error)?
        .map(|value| value.into_string())
        .transpose()
        .map_err(tiff_error)?
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f32>().ok());

    let image = decoder.read_image().map_err(tiff_error)?;
    let mut values = widen(image).ok_or_else(|| RasterError::MissingContent {
        path: path.to_path_buf(),
        what: "a supported sample format".to_string(),
    })?;
    if let Some(nodata) = nodata {
        values
            .iter_mut()
            .filter(|v| **v == nodata)
            .for_each(|v| *v = f32::NAN);
    }

    let grid = GridSpec::new(
        Crs::new(format!("EPSG:{epsg}")),
        Axis::regular("x", x + (half - i) * sx, sx, width as usize)?,
        Axis::regular("y", y - (half - j) * sy, -sy, height as usize)?,
    );
    let surface = Surface::new(grid, values)?;
    info!(
        "Read {}x{} surface from {} ({}), total {:.0}",
        width,
        height,
        path.display(),
        surface.grid().crs,
        surface.total()
    );
    Ok(surface)
}
