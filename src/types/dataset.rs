//! Identifies which atmospheric-model product a run reads and which
//! administrative depth it aggregates to.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The atmospheric-model product a concentration field comes from.
///
/// Both products go through the same pipeline once aligned; they differ in native
/// grid, resolution and temporal coverage, and the source only shows up in the
/// output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    /// Validated reanalysis of past years.
    Reanalysis,
    /// Operational forecast archive.
    Forecast,
}

impl DatasetSource {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetSource::Reanalysis => "reanalysis",
            DatasetSource::Forecast => "forecast",
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("administrative level {0} is outside the supported range 0-3")]
pub struct InvalidLevel(pub u8);

/// Depth in the NUTS hierarchy: 0 is a country, 3 the finest unit handled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AdminLevel(u8);

impl AdminLevel {
    pub const COUNTRY: AdminLevel = AdminLevel(0);
    pub const FINEST: AdminLevel = AdminLevel(3);

    pub fn new(level: u8) -> Result<Self, InvalidLevel> {
        if level <= 3 {
            Ok(Self(level))
        } else {
            Err(InvalidLevel(level))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = InvalidLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AdminLevel::new(value)
    }
}

impl From<AdminLevel> for u8 {
    fn from(level: AdminLevel) -> Self {
        level.0
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert_eq!(AdminLevel::new(3).map(AdminLevel::get), Ok(3));
        assert_eq!(AdminLevel::new(4), Err(InvalidLevel(4)));
    }

    #[test]
    fn test_level_deserialization_is_checked() {
        let level: AdminLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level.get(), 1);
        assert!(serde_json::from_str::<AdminLevel>("7").is_err());
    }

    #[test]
    fn test_source_names() {
        assert_eq!(DatasetSource::Forecast.to_string(), "forecast");
        let source: DatasetSource = serde_json::from_str("\"reanalysis\"").unwrap();
        assert_eq!(source, DatasetSource::Reanalysis);
    }
}
