//! Samples concentration time series at named points, e.g. the centroids of
//! the most populous municipalities of each country.

use crate::raster::field::RasterField;
use crate::schema::{COUNTRY_CODE, TIME};
use haversine::{distance, Location as HaversineLocation, Units};
use log::{info, warn};
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const POINT_ID: &str = "point_id";
pub const POINT_NAME: &str = "point_name";
pub const POINT_X: &str = "x";
pub const POINT_Y: &str = "y";
pub const VALUE: &str = "value";
pub const DISTANCE_KM: &str = "distance_km";

/// Decimals kept for point coordinates.
const COORDINATE_DECIMALS: i32 = 4;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Failed to read sample points from '{0}'")]
    Read(PathBuf, #[source] PolarsError),

    #[error("Column '{column}' of '{path}' is missing or has the wrong type")]
    Column {
        path: PathBuf,
        column: &'static str,
        #[source]
        source: PolarsError,
    },

    #[error("Row {row} of '{path}' has no value for '{column}'")]
    MissingValue {
        path: PathBuf,
        row: usize,
        column: &'static str,
    },

    #[error("Failed to assemble sample table")]
    Polars(#[from] PolarsError),
}

/// A named location, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    pub id: String,
    pub name: String,
    pub country: String,
    pub longitude: f64,
    pub latitude: f64,
    pub population: f64,
}

/// Reads points from a CSV with the columns `lau_id`, `lau_name`, `country`,
/// `longitude`, `latitude` and `population`. Identifiers, names and country
/// codes are read verbatim as text, keeping leading zeros.
pub fn read_points(path: &Path) -> Result<Vec<SamplePoint>, SamplingError> {
    let mut text_columns = Schema::default();
    for name in ["lau_id", "lau_name", "country"] {
        text_columns.with_column(name.into(), DataType::String);
    }
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(text_columns)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| SamplingError::Read(path.to_path_buf(), e))?
        .finish()
        .map_err(|e| SamplingError::Read(path.to_path_buf(), e))?;

    let column = |name: &'static str, dtype: DataType| {
        frame
            .column(name)
            .and_then(|c| c.cast(&dtype))
            .map_err(|source| SamplingError::Column {
                path: path.to_path_buf(),
                column: name,
                source,
            })
    };
    let ids = column("lau_id", DataType::String)?;
    let names = column("lau_name", DataType::String)?;
    let countries = column("country", DataType::String)?;
    let longitudes = column("longitude", DataType::Float64)?;
    let latitudes = column("latitude", DataType::Float64)?;
    let populations = column("population", DataType::Float64)?;

    let missing = |row: usize, column: &'static str| SamplingError::MissingValue {
        path: path.to_path_buf(),
        row,
        column,
    };
    let (ids, names, countries) = (ids.str()?, names.str()?, countries.str()?);
    let (longitudes, latitudes, populations) =
        (longitudes.f64()?, latitudes.f64()?, populations.f64()?);

    let mut points = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        points.push(SamplePoint {
            id: ids.get(row).ok_or_else(|| missing(row, "lau_id"))?.to_string(),
            name: names.get(row).unwrap_or_default().to_string(),
            country: countries
                .get(row)
                .ok_or_else(|| missing(row, "country"))?
                .to_string(),
            longitude: longitudes.get(row).ok_or_else(|| missing(row, "longitude"))?,
            latitude: latitudes.get(row).ok_or_else(|| missing(row, "latitude"))?,
            population: populations.get(row).unwrap_or(0.0),
        });
    }
    info!("Read {} sample points from {}", points.len(), path.display());
    Ok(points)
}

/// Keeps the `n` most populous points of each country. Countries appear in
/// order of first occurrence, points within a country by descending
/// population.
pub fn largest_per_country(points: Vec<SamplePoint>, n: usize) -> Vec<SamplePoint> {
    let mut order: Vec<String> = Vec::new();
    let mut by_country: HashMap<String, Vec<SamplePoint>> = HashMap::new();
    for point in points {
        if !by_country.contains_key(&point.country) {
            order.push(point.country.clone());
        }
        by_country.entry(point.country.clone()).or_default().push(point);
    }

    order
        .into_iter()
        .filter_map(|country| by_country.remove(&country))
        .flat_map(|mut group| {
            group.sort_by_key(|p| Reverse(OrderedFloat(p.population)));
            group.truncate(n);
            group
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// The full time series of the cell nearest to each point.
///
/// The field must use geographic coordinates. Output columns: `point_id`,
/// `point_name`, `CNTR_CODE`, `x`, `y` (the point, 4 decimals), `time`,
/// `value` (null for no-data) and `distance_km` between the point and the
/// center of the sampled cell. Points outside the grid are skipped.
pub fn sample_points(
    field: &RasterField,
    points: &[SamplePoint],
) -> Result<DataFrame, SamplingError> {
    let grid = field.grid();
    let width = grid.width();

    let mut ids = Vec::new();
    let mut names = Vec::new();
    let mut countries = Vec::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut times = Vec::new();
    let mut values = Vec::new();
    let mut distances = Vec::new();

    for point in points {
        let Some((row, col)) = grid.locate(point.longitude, point.latitude) else {
            warn!(
                "Sample point '{}' ({}, {}) lies outside the grid",
                point.id, point.longitude, point.latitude
            );
            continue;
        };
        let (x, y) = grid.cell_center(row, col);
        let distance_km = distance(
            HaversineLocation {
                latitude: point.latitude,
                longitude: point.longitude,
            },
            HaversineLocation {
                latitude: y,
                longitude: x,
            },
            Units::Kilometers,
        );

        for (time, layer) in field.layers() {
            let value = layer[row * width + col];
            ids.push(point.id.as_str());
            names.push(point.name.as_str());
            countries.push(point.country.as_str());
            xs.push(round_to(point.longitude, COORDINATE_DECIMALS));
            ys.push(round_to(point.latitude, COORDINATE_DECIMALS));
            times.push(time.and_utc().timestamp_millis());
            values.push((!value.is_nan()).then_some(value as f64));
            distances.push(distance_km);
        }
    }

    let time = Series::new(TIME.into(), times)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    let frame = DataFrame::new(vec![
        Series::new(POINT_ID.into(), ids).into(),
        Series::new(POINT_NAME.into(), names).into(),
        Series::new(COUNTRY_CODE.into(), countries).into(),
        Series::new(POINT_X.into(), xs).into(),
        Series::new(POINT_Y.into(), ys).into(),
        time.into(),
        Series::new(VALUE.into(), values).into(),
        Series::new(DISTANCE_KM.into(), distances).into(),
    ])?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::{Axis, Crs, GridSpec};
    use chrono::NaiveDate;
    use std::io::Write;

    fn point(id: &str, country: &str, lon: f64, lat: f64, population: f64) -> SamplePoint {
        SamplePoint {
            id: id.to_string(),
            name: format!("Town {id}"),
            country: country.to_string(),
            longitude: lon,
            latitude: lat,
            population,
        }
    }

    #[test]
    fn test_largest_per_country() {
        let points = vec![
            point("a", "NL", 0.0, 0.0, 10.0),
            point("b", "BE", 0.0, 0.0, 50.0),
            point("c", "NL", 0.0, 0.0, 30.0),
            point("d", "NL", 0.0, 0.0, 20.0),
        ];
        let kept: Vec<String> = largest_per_country(points, 2)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(kept, vec!["c", "d", "b"]);
    }

    #[test]
    fn test_sample_nearest_cell() -> Result<(), Box<dyn std::error::Error>> {
        let grid = GridSpec::new(
            Crs::wgs84(),
            Axis::regular("x", 4.05, 0.1, 3)?,
            Axis::regular("y", 52.25, -0.1, 2)?,
        );
        let t = |h| {
            NaiveDate::from_ymd_opt(2023, 3, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let field = RasterField::new(
            grid,
            vec![t(0), t(1)],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, f32::NAN, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0],
        )?;
        let points = vec![
            point("ams", "NL", 4.28004, 52.12, 900_000.0),
            point("far", "NL", 10.0, 52.2, 1.0),
        ];

        let table = sample_points(&field, &points)?;
        assert_eq!(table.height(), 2);
        let values: Vec<Option<f64>> = table.column(VALUE)?.f64()?.into_iter().collect();
        assert_eq!(values, vec![None, Some(16.0)]);
        assert_eq!(table.column(POINT_X)?.f64()?.get(0), Some(4.28));
        assert_eq!(table.column(POINT_Y)?.f64()?.get(0), Some(52.12));
        let km = table.column(DISTANCE_KM)?.f64()?.get(0).unwrap_or(f64::NAN);
        assert!(km > 0.0 && km < 5.0);
        Ok(())
    }

    #[test]
    fn test_read_points_from_csv() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "lau_id,lau_name,country,longitude,latitude,population")?;
        writeln!(file, "0363,Amsterdam,NL,4.9,52.37,931298")?;
        writeln!(file, "21004,Bruxelles,BE,4.35,50.85,")?;
        file.flush()?;

        let points = read_points(file.path())?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id, "0363");
        assert_eq!(points[1].id, "21004");
        assert_eq!(points[0].name, "Amsterdam");
        assert_eq!(points[0].population, 931_298.0);
        assert_eq!(points[1].country, "BE");
        assert_eq!(points[1].population, 0.0);
        Ok(())
    }
}
