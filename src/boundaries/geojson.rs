//! Reading and writing boundary files as GeoJSON feature collections.

use crate::boundaries::boundary::{country_prefix, filter_level, Boundary, NUTS_COUNTRY_PREFIX};
use crate::boundaries::error::BoundaryError;
use crate::types::dataset::AdminLevel;
use crate::utils::write_atomically;
use geo::{LineString, MultiPolygon, Polygon};
use log::{info, warn};
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;

type Ring = Vec<Vec<f64>>;

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
pub(crate) struct RawFeature {
    #[serde(default)]
    properties: Map<String, Value>,
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl RawFeature {
    /// A property rendered as text; numbers are accepted as well as strings.
    pub(crate) fn text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn level(&self, key: &str) -> Option<u8> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The feature's area, or `None` when the feature carries no geometry.
    pub(crate) fn multipolygon(&self, id: &str) -> Result<Option<MultiPolygon<f64>>, BoundaryError> {
        let Some(geometry) = &self.geometry else {
            return Ok(None);
        };
        let malformed = |source| BoundaryError::MalformedGeometry {
            id: id.to_string(),
            source,
        };
        let polygons = match geometry.kind.as_str() {
            "Polygon" => {
                let rings: Vec<Ring> =
                    serde_json::from_value(geometry.coordinates.clone()).map_err(malformed)?;
                vec![polygon_from_rings(rings).map_err(malformed)?]
            }
            "MultiPolygon" => {
                let parts: Vec<Vec<Ring>> =
                    serde_json::from_value(geometry.coordinates.clone()).map_err(malformed)?;
                parts
                    .into_iter()
                    .map(polygon_from_rings)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(malformed)?
            }
            other => {
                return Err(BoundaryError::UnsupportedGeometry {
                    id: id.to_string(),
                    kind: other.to_string(),
                })
            }
        };
        Ok(Some(MultiPolygon::new(polygons)))
    }
}

fn line_string(ring: Ring) -> Result<LineString<f64>, serde_json::Error> {
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(serde_json::Error::custom("position needs at least two coordinates")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::from)
}

fn polygon_from_rings(rings: Vec<Ring>) -> Result<Polygon<f64>, serde_json::Error> {
    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| serde_json::Error::custom("polygon has no exterior ring"))?;
    let interiors = rings.map(line_string).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(line_string(exterior)?, interiors))
}

pub(crate) fn read_features(path: &Path) -> Result<Vec<RawFeature>, BoundaryError> {
    let bytes = std::fs::read(path).map_err(|e| BoundaryError::Read(path.to_path_buf(), e))?;
    let collection: RawCollection = serde_json::from_slice(&bytes)
        .map_err(|e| BoundaryError::Parse(path.to_path_buf(), e))?;
    Ok(collection.features)
}

/// Reads every feature of a harmonized NUTS file.
///
/// Features need `NUTS_ID` and `LEVL_CODE`. The country code comes from
/// `CNTR_CODE` when present and from the identifier prefix otherwise; the name
/// from `NAME_LATN`, falling back to `NUTS_NAME`. Features without geometry are
/// skipped.
pub fn read_boundaries(path: &Path) -> Result<Vec<Boundary>, BoundaryError> {
    let features = read_features(path)?;
    let mut boundaries = Vec::with_capacity(features.len());

    for (index, feature) in features.iter().enumerate() {
        let id = feature.text("NUTS_ID").ok_or(BoundaryError::MissingProperty {
            index,
            property: "NUTS_ID",
        })?;
        let raw_level = feature.level("LEVL_CODE").ok_or(BoundaryError::MissingProperty {
            index,
            property: "LEVL_CODE",
        })?;
        let level = AdminLevel::new(raw_level).map_err(|source| BoundaryError::Level {
            id: id.clone(),
            source,
        })?;
        let Some(geometry) = feature.multipolygon(&id)? else {
            warn!("Boundary '{id}' has no geometry and is skipped");
            continue;
        };
        let country = feature
            .text("CNTR_CODE")
            .unwrap_or_else(|| country_prefix(&id, NUTS_COUNTRY_PREFIX));
        let name = feature
            .text("NAME_LATN")
            .or_else(|| feature.text("NUTS_NAME"))
            .unwrap_or_default();

        boundaries.push(Boundary {
            id,
            level,
            country,
            name,
            geometry,
        });
    }
    Ok(boundaries)
}

/// Reads the boundaries of one administrative level, in file order.
pub fn load_boundaries(path: &Path, level: AdminLevel) -> Result<Vec<Boundary>, BoundaryError> {
    let boundaries = filter_level(read_boundaries(path)?, level);
    info!(
        "Loaded {} boundaries at level {} from {}",
        boundaries.len(),
        level,
        path.display()
    );
    Ok(boundaries)
}

fn ring_coordinates(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn feature_json(boundary: &Boundary) -> Value {
    let coordinates: Vec<Vec<Vec<[f64; 2]>>> = boundary
        .geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring_coordinates)
                .collect()
        })
        .collect();
    json!({
        "type": "Feature",
        "properties": {
            "NUTS_ID": boundary.id,
            "LEVL_CODE": boundary.level.get(),
            "CNTR_CODE": boundary.country,
            "NAME_LATN": boundary.name,
            "NUTS_NAME": boundary.name,
        },
        "geometry": { "type": "MultiPolygon", "coordinates": coordinates },
    })
}

/// Writes boundaries as a GeoJSON feature collection with NUTS property names.
pub fn write_geojson(boundaries: &[Boundary], path: &Path) -> Result<(), BoundaryError> {
    let collection = json!({
        "type": "FeatureCollection",
        "features": boundaries.iter().map(feature_json).collect::<Vec<_>>(),
    });
    let bytes = serde_json::to_vec(&collection)
        .map_err(|e| BoundaryError::Encode(path.to_path_buf(), e))?;
    write_atomically(path, &bytes).map_err(|e| BoundaryError::Write(path.to_path_buf(), e))?;
    info!("Wrote {} boundaries to {}", boundaries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"NUTS_ID": "NL", "LEVL_CODE": 0, "CNTR_CODE": "NL", "NAME_LATN": "Nederland"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
            {"type": "Feature",
             "properties": {"NUTS_ID": "NL329", "LEVL_CODE": "3", "NAME_LATN": "Groot-Amsterdam"},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                 [[[0,0,5],[1,0,5],[1,1,5],[0,1,5],[0,0,5]]],
                 [[[1.5,1.5],[2,1.5],[2,2],[1.5,1.5]]]
             ]}},
            {"type": "Feature",
             "properties": {"NUTS_ID": "NL33A", "LEVL_CODE": 3, "NAME_LATN": "Zuidwest-Gelderland"},
             "geometry": null}
        ]
    }"#;

    fn sample_file() -> Result<tempfile::NamedTempFile, Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_read_boundaries() -> Result<(), Box<dyn std::error::Error>> {
        let file = sample_file()?;
        let boundaries = read_boundaries(file.path())?;
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].name, "Nederland");
        // CNTR_CODE missing, falls back to the identifier prefix
        assert_eq!(boundaries[1].country, "NL");
        assert_eq!(boundaries[1].level, AdminLevel::FINEST);
        assert_eq!(boundaries[1].geometry.0.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_filters_level() -> Result<(), Box<dyn std::error::Error>> {
        let file = sample_file()?;
        let boundaries = load_boundaries(file.path(), AdminLevel::COUNTRY)?;
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].id, "NL");
        Ok(())
    }

    #[test]
    fn test_point_geometry_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(
            &mut file,
            br#"{"type":"FeatureCollection","features":[{"type":"Feature",
                "properties":{"NUTS_ID":"BE","LEVL_CODE":0},
                "geometry":{"type":"Point","coordinates":[4.3,50.8]}}]}"#,
        )?;
        let result = read_boundaries(file.path());
        assert!(matches!(result, Err(BoundaryError::UnsupportedGeometry { kind, .. }) if kind == "Point"));
        Ok(())
    }

    #[test]
    fn test_written_file_reads_back() -> Result<(), Box<dyn std::error::Error>> {
        let file = sample_file()?;
        let boundaries = read_boundaries(file.path())?;
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("expanded.json");
        write_geojson(&boundaries, &out)?;
        assert_eq!(read_boundaries(&out)?, boundaries);
        Ok(())
    }
}
