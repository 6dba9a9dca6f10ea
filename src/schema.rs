//! The columns of an output table and how each one is finished.
//!
//! Every column carries a [`ColumnKind`] that fixes its null fill, rounding
//! and type, so finishing a table never depends on what a column is called.

use crate::types::time_bucket::TimeBucket;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const ZONE_CODE: &str = "zone_code";
pub const TIME: &str = "time";
pub const IDENTIFIER: &str = "NUTS_ID";
pub const COUNTRY_CODE: &str = "CNTR_CODE";
pub const NAME: &str = "NAME_LATN";
pub const MEAN: &str = "pm2p5_mean";
pub const TOTAL_POPULATION: &str = "total_population";
pub const EU_CATEGORY: &str = "EU_category";
pub const WHO_CATEGORY: &str = "WHO_category";

/// Decimals kept for means and percentages.
pub const DECIMALS: u32 = 3;

pub fn affected_population_column(band: &str) -> String {
    format!("affected_population_{band}")
}

pub fn percentage_column(band: &str) -> String {
    format!("percentage_{band}")
}

/// Semantic type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Identifier,
    CountryCode,
    Name,
    Time,
    /// Mean concentration in µg/m³. A zone without valid cells is written
    /// as 0; on classified rows its categories stay blank.
    MeanConcentration,
    /// Head count.
    Population,
    /// Share of a zone's population, between 0 and 1.
    Percentage,
    /// Classification label.
    Category,
}

impl ColumnKind {
    /// Fill, rounding and type applied to a column of this kind.
    pub fn finish(&self, name: &str) -> Expr {
        match self {
            ColumnKind::Population => col(name)
                .fill_null(lit(0.0))
                .round(0)
                .cast(DataType::Int64),
            ColumnKind::MeanConcentration | ColumnKind::Percentage => {
                col(name).fill_null(lit(0.0)).round(DECIMALS)
            }
            ColumnKind::Identifier
            | ColumnKind::CountryCode
            | ColumnKind::Name
            | ColumnKind::Time
            | ColumnKind::Category => col(name),
        }
    }
}

/// Column naming of a written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Machine-oriented names (`NUTS_ID`, `affected_population_10-15`, ...).
    #[default]
    Raw,
    /// Human-readable headers; yearly tables report the year as an integer.
    Report,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub kind: ColumnKind,
    band: Option<String>,
}

impl OutputColumn {
    fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        OutputColumn {
            name: name.into(),
            kind,
            band: None,
        }
    }

    fn banded(name: String, kind: ColumnKind, band: &str) -> Self {
        OutputColumn {
            name,
            kind,
            band: Some(band.to_string()),
        }
    }
}

/// Ordered columns of one pipeline output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    bucket: TimeBucket,
    columns: Vec<OutputColumn>,
}

impl OutputSchema {
    /// Columns for a run at `bucket` with the given band labels. Population
    /// columns appear only when the bucket carries population, category
    /// columns only when it is classified.
    pub fn new(bucket: TimeBucket, bands: &[String]) -> Self {
        let mut columns = vec![
            OutputColumn::new(IDENTIFIER, ColumnKind::Identifier),
            OutputColumn::new(COUNTRY_CODE, ColumnKind::CountryCode),
            OutputColumn::new(NAME, ColumnKind::Name),
            OutputColumn::new(TIME, ColumnKind::Time),
            OutputColumn::new(MEAN, ColumnKind::MeanConcentration),
        ];
        if bucket.carries_population() {
            columns.push(OutputColumn::new(TOTAL_POPULATION, ColumnKind::Population));
            for band in bands {
                columns.push(OutputColumn::banded(
                    affected_population_column(band),
                    ColumnKind::Population,
                    band,
                ));
            }
            for band in bands {
                columns.push(OutputColumn::banded(
                    percentage_column(band),
                    ColumnKind::Percentage,
                    band,
                ));
            }
        }
        if bucket.is_classified() {
            columns.push(OutputColumn::new(EU_CATEGORY, ColumnKind::Category));
            columns.push(OutputColumn::new(WHO_CATEGORY, ColumnKind::Category));
        }
        OutputSchema { bucket, columns }
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Selects the schema's columns in order, each finished per its kind.
    pub fn finish(&self, frame: LazyFrame) -> LazyFrame {
        frame.select(
            self.columns
                .iter()
                .map(|c| c.kind.finish(&c.name))
                .collect::<Vec<_>>(),
        )
    }

    /// Header of `column` in `layout`.
    pub fn header(&self, column: &OutputColumn, layout: Layout) -> String {
        if layout == Layout::Raw {
            return column.name.clone();
        }
        let band = column.band.as_deref().map(band_header);
        match (column.kind, band) {
            (ColumnKind::Identifier, _) => "NUTS ID".to_string(),
            (ColumnKind::CountryCode, _) => "Country code".to_string(),
            (ColumnKind::Name, _) => "Name (latin characters)".to_string(),
            (ColumnKind::Time, _) => self.bucket.noun().to_string(),
            (ColumnKind::MeanConcentration, _) => {
                format!("{} PM 2.5 average (µg/m³)", self.bucket.adjective())
            }
            (ColumnKind::Population, None) => "Population estimate (GHSL 2020)".to_string(),
            (ColumnKind::Population, Some(band)) => format!("{band} - population"),
            (ColumnKind::Percentage, band) => {
                format!("{} - percentage", band.unwrap_or_default())
            }
            (ColumnKind::Category, _) if column.name == WHO_CATEGORY => {
                "WHO Air Quality Guidelines classification".to_string()
            }
            (ColumnKind::Category, _) => "EU Air Quality Guidelines classification".to_string(),
        }
    }

    /// Renames a finished table for `layout`. Report tables of yearly runs
    /// carry the year instead of the 31 December date.
    pub fn apply_layout(&self, frame: DataFrame, layout: Layout) -> PolarsResult<DataFrame> {
        if layout == Layout::Raw {
            return Ok(frame);
        }
        let renamed: Vec<Expr> = self
            .columns
            .iter()
            .map(|c| {
                let header = self.header(c, layout);
                if c.kind == ColumnKind::Time && self.bucket == TimeBucket::Year {
                    col(c.name.as_str()).dt().year().alias(header)
                } else {
                    col(c.name.as_str()).alias(header)
                }
            })
            .collect();
        frame.lazy().select(renamed).collect()
    }
}

/// `"10-15"` becomes `"10–15µg/m³"`, `"25+"` becomes `"25+ µg/m³"`.
fn band_header(band: &str) -> String {
    if band.ends_with('+') {
        format!("{band} µg/m³")
    } else {
        format!("{}µg/m³", band.replacen('-', "–", 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["0-10".to_string(), "10+".to_string()]
    }

    #[test]
    fn test_yearly_schema_has_population_only() {
        let schema = OutputSchema::new(TimeBucket::Year, &labels());
        assert_eq!(
            schema.names(),
            vec![
                "NUTS_ID",
                "CNTR_CODE",
                "NAME_LATN",
                "time",
                "pm2p5_mean",
                "total_population",
                "affected_population_0-10",
                "affected_population_10+",
                "percentage_0-10",
                "percentage_10+",
            ]
        );
        let daily = OutputSchema::new(TimeBucket::Day, &labels());
        assert_eq!(daily.names().last(), Some(&"WHO_category"));
        assert_eq!(OutputSchema::new(TimeBucket::Week, &labels()).columns().len(), 5);
    }

    #[test]
    fn test_report_headers() {
        let schema = OutputSchema::new(TimeBucket::Year, &labels());
        let headers: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| schema.header(c, Layout::Report))
            .collect();
        assert_eq!(headers[3], "Year");
        assert_eq!(headers[4], "Yearly PM 2.5 average (µg/m³)");
        assert_eq!(headers[5], "Population estimate (GHSL 2020)");
        assert_eq!(headers[6], "0–10µg/m³ - population");
        assert_eq!(headers[7], "10+ µg/m³ - population");
        assert_eq!(headers[9], "10+ µg/m³ - percentage");
    }

    #[test]
    fn test_finish_fills_and_rounds() -> PolarsResult<()> {
        let frame = df!(
            "people" => [Some(10.6), None, Some(0.4)],
            "share" => [Some(0.123456), None, Some(1.0)],
        )?;
        let out = frame
            .lazy()
            .select([
                ColumnKind::Population.finish("people"),
                ColumnKind::Percentage.finish("share"),
            ])
            .collect()?;
        let people: Vec<Option<i64>> = out.column("people")?.i64()?.into_iter().collect();
        assert_eq!(people, vec![Some(11), Some(0), Some(0)]);
        let share: Vec<Option<f64>> = out.column("share")?.f64()?.into_iter().collect();
        assert_eq!(share, vec![Some(0.123), Some(0.0), Some(1.0)]);
        Ok(())
    }
}
