//! Air-quality categories for mean PM2.5 concentrations.
//!
//! Bins are closed on the left and open on the right, so a value on an edge
//! belongs to the higher category. The full range is `[0, 800)` µg/m³.

use std::fmt;
use thiserror::Error;

/// Upper end of the domain shared by both scales.
pub const DOMAIN_MAX: f64 = 800.0;

const EU_EDGES: [f64; 5] = [10.0, 20.0, 25.0, 50.0, 75.0];
const WHO_EDGES: [f64; 5] = [15.0, 25.0, 37.5, 50.0, 75.0];

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ClassifyError {
    #[error("Concentration {0} µg/m³ is outside the classified range [0, 800)")]
    OutOfRange(f64),
    #[error("Concentration is not a number")]
    NotANumber,
}

/// European Environment Agency air-quality index band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EuCategory {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
    ExtremelyPoor,
}

impl EuCategory {
    const ALL: [EuCategory; 6] = [
        EuCategory::Good,
        EuCategory::Fair,
        EuCategory::Moderate,
        EuCategory::Poor,
        EuCategory::VeryPoor,
        EuCategory::ExtremelyPoor,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EuCategory::Good => "Good (0-10)",
            EuCategory::Fair => "Fair (10-20)",
            EuCategory::Moderate => "Moderate (20-25)",
            EuCategory::Poor => "Poor (25-50)",
            EuCategory::VeryPoor => "Very poor (50-75)",
            EuCategory::ExtremelyPoor => "Extremely poor (75-800)",
        }
    }
}

/// WHO 2021 guideline level or interim target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WhoCategory {
    AqgLevel,
    InterimTarget4,
    InterimTarget3,
    InterimTarget2,
    InterimTarget1,
    OverInterimTargets,
}

impl WhoCategory {
    const ALL: [WhoCategory; 6] = [
        WhoCategory::AqgLevel,
        WhoCategory::InterimTarget4,
        WhoCategory::InterimTarget3,
        WhoCategory::InterimTarget2,
        WhoCategory::InterimTarget1,
        WhoCategory::OverInterimTargets,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WhoCategory::AqgLevel => "AQG level (0-15)",
            WhoCategory::InterimTarget4 => "Interim target 4 (15-25)",
            WhoCategory::InterimTarget3 => "Interim target 3 (25-37.5)",
            WhoCategory::InterimTarget2 => "Interim target 2 (37.5-50)",
            WhoCategory::InterimTarget1 => "Interim target 1 (50-75)",
            WhoCategory::OverInterimTargets => "Over interim targets (75+)",
        }
    }
}

impl fmt::Display for EuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for WhoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub eu: EuCategory,
    pub who: WhoCategory,
}

/// Number of edges at or below `value`.
fn bin(edges: &[f64], value: f64) -> usize {
    edges.iter().take_while(|&&edge| value >= edge).count()
}

/// Classifies a mean concentration on both scales.
///
/// # Errors
///
/// [`ClassifyError::OutOfRange`] below 0 or at/above 800 µg/m³ and
/// [`ClassifyError::NotANumber`] for `NaN`.
pub fn classify(value: f64) -> Result<Classification, ClassifyError> {
    if value.is_nan() {
        return Err(ClassifyError::NotANumber);
    }
    if !(0.0..DOMAIN_MAX).contains(&value) {
        return Err(ClassifyError::OutOfRange(value));
    }
    Ok(Classification {
        eu: EuCategory::ALL[bin(&EU_EDGES, value)],
        who: WhoCategory::ALL[bin(&WHO_EDGES, value)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_go_to_higher_band() -> Result<(), ClassifyError> {
        assert_eq!(classify(10.0)?.eu, EuCategory::Fair);
        assert_eq!(classify(9.999)?.eu, EuCategory::Good);
        assert_eq!(classify(37.5)?.who, WhoCategory::InterimTarget2);
        assert_eq!(classify(75.0)?.eu, EuCategory::ExtremelyPoor);
        Ok(())
    }

    #[test]
    fn test_reference_values() -> Result<(), ClassifyError> {
        let c = classify(24.999)?;
        assert_eq!(c.eu.label(), "Moderate (20-25)");
        assert_eq!(c.who.label(), "Interim target 4 (15-25)");

        let c = classify(0.0)?;
        assert_eq!(c.eu.label(), "Good (0-10)");
        assert_eq!(c.who.label(), "AQG level (0-15)");

        let c = classify(12.0)?;
        assert_eq!(c.eu.to_string(), "Fair (10-20)");
        assert_eq!(c.who.to_string(), "AQG level (0-15)");

        assert_eq!(classify(799.9)?.who, WhoCategory::OverInterimTargets);
        Ok(())
    }

    #[test]
    fn test_out_of_domain() {
        assert_eq!(classify(800.0), Err(ClassifyError::OutOfRange(800.0)));
        assert_eq!(classify(-0.5), Err(ClassifyError::OutOfRange(-0.5)));
        assert_eq!(classify(f64::NAN), Err(ClassifyError::NotANumber));
        assert_eq!(
            classify(f64::INFINITY),
            Err(ClassifyError::OutOfRange(f64::INFINITY))
        );
    }
}
