//! Concentration fields from CF-style NetCDF files, as delivered by CAMS.
//!
//! The concentration variable must be laid out as `(time, [singleton dims], y, x)`,
//! e.g. `pm2p5(time, lat, lon)` for reanalysis or
//! `pm2p5_conc(time, level, latitude, longitude)` for forecasts. Packed values
//! are unpacked with `scale_factor`/`add_offset`, and `_FillValue` or
//! `missing_value` cells become `NaN`.

use crate::raster::error::RasterError;
use crate::raster::field::RasterField;
use crate::raster::grid::{Axis, Crs, GridSpec};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use netcdf::AttributeValue;
use std::path::Path;

/// Variable names tried in order when looking for the concentration.
pub const CONCENTRATION_VARIABLES: [&str; 4] =
    ["pm2p5_mean", "pm2p5", "pm2p5_conc", "pm2p5_conc_mean"];

const TIME_DIMENSION: &str = "time";

fn missing(path: &Path, what: impl Into<String>) -> RasterError {
    RasterError::MissingContent {
        path: path.to_path_buf(),
        what: what.into(),
    }
}

/// Checks for the attribute first, so absent optional attributes stay quiet in HDF5.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Ulonglong(v) => Some(v as f64),
        _ => None,
    }
}

/// All values of a numeric variable widened to `f64`, whatever its stored type.
fn values_as_f64(var: &netcdf::Variable, path: &Path) -> Result<Vec<f64>, RasterError> {
    if let Ok(values) = var.get_values::<f64, _>(..) {
        return Ok(values);
    }
    if let Ok(values) = var.get_values::<f32, _>(..) {
        return Ok(values.into_iter().map(f64::from).collect());
    }
    if let Ok(values) = var.get_values::<i64, _>(..) {
        return Ok(values.into_iter().map(|v| v as f64).collect());
    }
    if let Ok(values) = var.get_values::<i32, _>(..) {
        return Ok(values.into_iter().map(f64::from).collect());
    }
    var.get_values::<i16, _>(..)
        .map(|values| values.into_iter().map(f64::from).collect())
        .map_err(|e| RasterError::NetCdf(path.to_path_buf(), e))
}

fn string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Parses CF time units such as `hours since 1900-01-01 00:00:0.0` into the
/// length of one unit in milliseconds and the reference instant.
pub(crate) fn parse_time_units(units: &str) -> Option<(f64, NaiveDateTime)> {
    let (unit, reference) = units.split_once(" since ")?;
    let unit_ms = match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 86_400_000.0,
        "hours" | "hour" | "h" => 3_600_000.0,
        "minutes" | "minute" | "min" => 60_000.0,
        "seconds" | "second" | "s" => 1_000.0,
        "milliseconds" | "ms" => 1.0,
        "microseconds" | "us" => 1e-3,
        "nanoseconds" | "ns" => 1e-6,
        _ => return None,
    };

    let reference = reference.trim().trim_end_matches('Z');
    let (date, time) = match reference.split_once(|c: char| c == 'T' || c == ' ') {
        Some((date, time)) => (date, Some(time.trim())),
        None => (reference, None),
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = match time {
        None | Some("") => NaiveTime::from_hms_opt(0, 0, 0)?,
        Some(time) => {
            let mut parts = time.split(':');
            let hour: u32 = parts.next()?.parse().ok()?;
            let minute: u32 = parts.next().unwrap_or("0").parse().ok()?;
            let second: f64 = parts.next().unwrap_or("0").parse().ok()?;
            NaiveTime::from_hms_opt(hour, minute, 0)?
                + Duration::milliseconds((second * 1_000.0).round() as i64)
        }
    };
    Some((unit_ms, date.and_time(time)))
}

fn read_coordinates(
    file: &netcdf::File,
    path: &Path,
    dimension: &str,
    axis: &'static str,
) -> Result<Axis, RasterError> {
    let var = file
        .variable(dimension)
        .ok_or_else(|| missing(path, format!("coordinate variable '{dimension}'")))?;
    Axis::new(axis, values_as_f64(&var, path)?)
}

fn read_crs(file: &netcdf::File, var: &netcdf::Variable, path: &Path) -> Result<Crs, RasterError> {
    let Some(mapping) = string_attr(var, "grid_mapping") else {
        // CF: plain lat/lon coordinates without a grid mapping
        return Ok(Crs::wgs84());
    };
    let mapping_var = file
        .variable(&mapping)
        .ok_or_else(|| missing(path, format!("grid mapping variable '{mapping}'")))?;
    if let Some(code) = string_attr(&mapping_var, "epsg_code") {
        return Ok(Crs::new(code));
    }
    match string_attr(&mapping_var, "grid_mapping_name").as_deref() {
        Some("latitude_longitude") => Ok(Crs::wgs84()),
        other => Err(RasterError::UnsupportedCrs {
            path: path.to_path_buf(),
            description: other.unwrap_or("unnamed grid mapping").to_string(),
        }),
    }
}

/// Reads the first variable of [`CONCENTRATION_VARIABLES`] present in `path`.
pub fn read_netcdf_field(path: &Path) -> Result<RasterField, RasterError> {
    let file = netcdf::open(path).map_err(|e| RasterError::NetCdf(path.to_path_buf(), e))?;
    let name = CONCENTRATION_VARIABLES
        .iter()
        .find(|name| file.variable(name).is_some())
        .ok_or_else(|| missing(path, format!("any of {CONCENTRATION_VARIABLES:?}")))?;
    read_variable(&file, path, name)
}

/// Reads one `(time, ..., y, x)` variable of an open file.
fn read_variable(
    file: &netcdf::File,
    path: &Path,
    name: &str,
) -> Result<RasterField, RasterError> {
    let var = file
        .variable(name)
        .ok_or_else(|| missing(path, format!("variable '{name}'")))?;

    let dims: Vec<(String, usize)> = var
        .dimensions()
        .iter()
        .map(|d| (d.name(), d.len()))
        .collect();
    let layout_error = || RasterError::UnexpectedLayout {
        path: path.to_path_buf(),
        variable: name.to_string(),
        dimensions: dims.iter().map(|(n, _)| n.clone()).collect(),
    };
    if dims.len() < 3 || dims[0].0 != TIME_DIMENSION {
        return Err(layout_error());
    }
    // squeeze e.g. a single forecast level
    if dims[1..dims.len() - 2].iter().any(|(_, len)| *len != 1) {
        return Err(layout_error());
    }
    let y_dim = &dims[dims.len() - 2].0;
    let x_dim = &dims[dims.len() - 1].0;

    let grid = GridSpec::new(
        read_crs(file, &var, path)?,
        read_coordinates(file, path, x_dim, "x")?,
        read_coordinates(file, path, y_dim, "y")?,
    );

    let time_var = file
        .variable(TIME_DIMENSION)
        .ok_or_else(|| missing(path, "coordinate variable 'time'"))?;
    let units = string_attr(&time_var, "units").unwrap_or_default();
    let (unit_ms, reference) =
        parse_time_units(&units).ok_or_else(|| RasterError::TimeUnits {
            path: path.to_path_buf(),
            units: units.clone(),
        })?;
    let offsets = values_as_f64(&time_var, path)?;
    let times = offsets
        .iter()
        .map(|offset| reference + Duration::milliseconds((offset * unit_ms).round() as i64))
        .collect();

    let raw = values_as_f64(&var, path)?;
    let fill = f64_attr(&var, "_FillValue");
    let missing_value = f64_attr(&var, "missing_value");
    let scale = f64_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = f64_attr(&var, "add_offset").unwrap_or(0.0);
    debug!(
        "Variable '{name}' of {}: scale {scale}, offset {offset}, fill {fill:?}",
        path.display()
    );
    let values = raw
        .into_iter()
        .map(|v| {
            if v.is_nan() || Some(v) == fill || Some(v) == missing_value {
                f32::NAN
            } else {
                (v * scale + offset) as f32
            }
        })
        .collect();

    let field = RasterField::new(grid, times, values)?;
    info!(
        "Read '{name}' from {}: {} time steps on a {}x{} grid",
        path.display(),
        field.time_len(),
        field.grid().width(),
        field.grid().height()
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_time_units() {
        let (ms, reference) = parse_time_units("hours since 1900-01-01 00:00:0.0").unwrap();
        assert_eq!(ms, 3_600_000.0);
        assert_eq!(reference, at(1900, 1, 1, 0));

        let (ms, reference) = parse_time_units("seconds since 2022-03-01T06:00:00Z").unwrap();
        assert_eq!(ms, 1_000.0);
        assert_eq!(reference, at(2022, 3, 1, 6));

        assert_eq!(parse_time_units("days since 2018-01-01").unwrap().1, at(2018, 1, 1, 0));
        assert!(parse_time_units("fortnights since 2018-01-01").is_none());
        assert!(parse_time_units("hours").is_none());
    }

    #[test]
    fn test_reads_packed_concentration() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("2022-reanalysis.nc");
        {
            let mut file = netcdf::create(&path)?;
            file.add_dimension("time", 2)?;
            file.add_dimension("level", 1)?;
            file.add_dimension("latitude", 2)?;
            file.add_dimension("longitude", 3)?;

            let mut time = file.add_variable::<f64>("time", &["time"])?;
            time.put_attribute("units", "hours since 2022-01-01 00:00:0.0")?;
            time.put_values(&[0.0, 12.0], ..)?;
            let mut lat = file.add_variable::<f64>("latitude", &["latitude"])?;
            lat.put_values(&[52.15, 52.05], ..)?;
            let mut lon = file.add_variable::<f64>("longitude", &["longitude"])?;
            lon.put_values(&[4.05, 4.15, 4.25], ..)?;

            let mut pm = file.add_variable::<i16>(
                "pm2p5_conc",
                &["time", "level", "latitude", "longitude"],
            )?;
            pm.put_attribute("scale_factor", 0.5f64)?;
            pm.put_attribute("add_offset", 1.0f64)?;
            pm.put_attribute("missing_value", -1.0f64)?;
            pm.put_values(&[0i16, 2, 4, 6, 8, -1, 10, 12, 14, 16, 18, 20], ..)?;
        }

        let field = read_netcdf_field(&path)?;
        assert_eq!(field.times(), &[at(2022, 1, 1, 0), at(2022, 1, 1, 12)]);
        assert_eq!(field.grid().crs, Crs::wgs84());
        assert_eq!(field.grid().width(), 3);
        assert_eq!(field.grid().height(), 2);
        assert_eq!(field.get(0, 0, 1), 2.0);
        assert!(field.get(0, 1, 2).is_nan());
        assert_eq!(field.get(1, 1, 2), 11.0);
        Ok(())
    }

    #[test]
    fn test_level_dimension_must_be_singleton() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("levels.nc");
        {
            let mut file = netcdf::create(&path)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("level", 2)?;
            file.add_dimension("lat", 2)?;
            file.add_dimension("lon", 2)?;
            let mut time = file.add_variable::<f64>("time", &["time"])?;
            time.put_attribute("units", "hours since 2022-01-01")?;
            time.put_values(&[0.0], ..)?;
            let mut pm = file.add_variable::<f32>("pm2p5", &["time", "level", "lat", "lon"])?;
            pm.put_values(&[1.0f32; 8], ..)?;
        }

        assert!(matches!(
            read_netcdf_field(&path),
            Err(RasterError::UnexpectedLayout { variable, .. }) if variable == "pm2p5"
        ));
        Ok(())
    }
}
