use crate::types::dataset::AdminLevel;
use geo::{BoundingRect, MultiPolygon, Rect};

/// Length of the country prefix of a NUTS identifier (`DE`, `FR`, ...).
pub const NUTS_COUNTRY_PREFIX: usize = 2;

/// One administrative unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Administrative code, e.g. `NL329` or `UKR.1.3`.
    pub id: String,
    pub level: AdminLevel,
    pub country: String,
    /// Display name in latin characters.
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    /// Builds a boundary whose country code is the NUTS prefix of `id`.
    pub fn new(
        id: impl Into<String>,
        level: AdminLevel,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        let id = id.into();
        let country = country_prefix(&id, NUTS_COUNTRY_PREFIX);
        Boundary {
            id,
            level,
            country,
            name: name.into(),
            geometry,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// The first `len` characters of an identifier.
pub fn country_prefix(id: &str, len: usize) -> String {
    id.chars().take(len).collect()
}

/// Keeps the boundaries of a single level, preserving file order.
pub fn filter_level(boundaries: Vec<Boundary>, level: AdminLevel) -> Vec<Boundary> {
    boundaries.into_iter().filter(|b| b.level == level).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(id: &str, level: u8) -> Boundary {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        Boundary::new(
            id,
            AdminLevel::new(level).unwrap(),
            id,
            MultiPolygon::new(vec![poly]),
        )
    }

    #[test]
    fn test_country_from_prefix() {
        assert_eq!(square("NL329", 3).country, "NL");
        assert_eq!(country_prefix("UKR.1_1", 3), "UKR");
        assert_eq!(country_prefix("X", 2), "X");
    }

    #[test]
    fn test_filter_level_keeps_order() {
        let all = vec![square("NL", 0), square("NL3", 1), square("NL329", 3), square("DE", 0)];
        let ids: Vec<_> = filter_level(all, AdminLevel::COUNTRY)
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["NL", "DE"]);
    }
}
