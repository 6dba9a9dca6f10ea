//! Merges territories outside the NUTS classification into a NUTS boundary set.
//!
//! Those territories publish their own hierarchies (some only at depths 0 and
//! 2). Each layer is read with its own `id`/`name` properties and remapped to
//! the level it stands in for: 0 for the country outline, 3 for the finest
//! subdivision available.

use crate::boundaries::boundary::{country_prefix, Boundary};
use crate::boundaries::error::BoundaryError;
use crate::boundaries::geojson::read_features;
use crate::types::dataset::AdminLevel;
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Levels of the base NUTS file kept in a harmonized set.
pub const KEPT_NUTS_LEVELS: [u8; 3] = [0, 1, 3];

/// Length of the country prefix of a territory identifier (`UKR`, `BIH`, ...).
pub const TERRITORY_COUNTRY_PREFIX: usize = 3;

const PLACEHOLDER: char = '?';

/// A boundary file for one territory, remapped to a NUTS level.
#[derive(Debug, Clone, PartialEq)]
pub struct TerritoryLayer {
    /// Three-letter code of the territory, e.g. `UKR`.
    pub country: String,
    pub level: AdminLevel,
    pub path: PathBuf,
}

impl TerritoryLayer {
    pub fn new(country: impl Into<String>, level: AdminLevel, path: impl Into<PathBuf>) -> Self {
        Self {
            country: country.into(),
            level,
            path: path.into(),
        }
    }

    /// Reads the layer's features as boundaries at the remapped level.
    ///
    /// `?` stands for unknown identifiers and names in these files; it is
    /// replaced with `<CC>.xxx` and `Unknown name <CC> division`.
    pub fn load(&self) -> Result<Vec<Boundary>, BoundaryError> {
        let features = read_features(&self.path)?;
        let mut boundaries = Vec::with_capacity(features.len());
        for (index, feature) in features.iter().enumerate() {
            let raw_id = feature.text("id").ok_or(BoundaryError::MissingProperty {
                index,
                property: "id",
            })?;
            let id = raw_id.replace(PLACEHOLDER, &format!("{}.xxx", self.country));
            let name = feature
                .text("name")
                .unwrap_or_default()
                .replace(PLACEHOLDER, &format!("Unknown name {} division", self.country));
            let Some(geometry) = feature.multipolygon(&id)? else {
                warn!("Territory boundary '{id}' in {} has no geometry", self.path.display());
                continue;
            };
            boundaries.push(Boundary {
                country: country_prefix(&id, TERRITORY_COUNTRY_PREFIX),
                id,
                level: self.level,
                name,
                geometry,
            });
        }
        Ok(boundaries)
    }
}

/// Combines a NUTS set with territory boundaries.
///
/// The base keeps levels 0, 1 and 3. Territory boundaries follow it, country
/// outlines first and subdivisions after, each group in the order given.
pub fn harmonize(base: Vec<Boundary>, territories: Vec<Vec<Boundary>>) -> Vec<Boundary> {
    let mut merged: Vec<Boundary> = base
        .into_iter()
        .filter(|b| KEPT_NUTS_LEVELS.contains(&b.level.get()))
        .collect();
    let mut extra: Vec<Boundary> = territories.into_iter().flatten().collect();
    extra.sort_by_key(|b| b.level);
    merged.extend(extra);

    let mut seen = HashSet::new();
    for boundary in &merged {
        if !seen.insert((boundary.level, boundary.id.as_str())) {
            warn!(
                "Identifier '{}' occurs more than once at level {}",
                boundary.id, boundary.level
            );
        }
    }
    merged
}

/// Reads a NUTS file and territory layers and returns the harmonized set.
pub fn harmonize_files(
    base: &Path,
    territories: &[TerritoryLayer],
) -> Result<Vec<Boundary>, BoundaryError> {
    let base_boundaries = crate::boundaries::geojson::read_boundaries(base)?;
    let layers = territories
        .iter()
        .map(TerritoryLayer::load)
        .collect::<Result<Vec<_>, _>>()?;
    let merged = harmonize(base_boundaries, layers);
    info!(
        "Harmonized {} boundaries from {} territory layers",
        merged.len(),
        territories.len()
    );
    Ok(merged)
}
