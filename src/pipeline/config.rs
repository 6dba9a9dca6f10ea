//! Explicit configuration of a pipeline run.
//!
//! A [`PipelineConfig`] names every input, the output directory and the
//! processing parameters of one run; nothing in the library reads paths from
//! anywhere else. A [`RunPlan`] expands shared inputs into one config per
//! (administrative level, time bucket) combination.

use crate::aggregation::masks::Thresholds;
use crate::pipeline::error::PipelineError;
use crate::schema::Layout;
use crate::types::dataset::{AdminLevel, DatasetSource};
use crate::types::time_bucket::{TimeBucket, TimeSlice};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Grid rescale applied after temporal resampling, approximating the scale
/// of the smaller administrative units.
pub const DEFAULT_RESCALE_FACTOR: f64 = 3.0;

fn default_rescale_factor() -> f64 {
    DEFAULT_RESCALE_FACTOR
}

/// File format of the written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// Everything one pipeline invocation needs.
///
/// # Examples
///
/// ```
/// use pm25_exposure::{AdminLevel, DatasetSource, PipelineConfig, TimeBucket};
///
/// let config = PipelineConfig::builder()
///     .source(DatasetSource::Reanalysis)
///     .concentration("data/pm2p5-2022.grid")
///     .population("data/ghsl-2020.grid")
///     .boundaries("data/nuts-harmonized.geojson")
///     .output_dir("out")
///     .level(AdminLevel::FINEST)
///     .bucket(TimeBucket::Year)
///     .build();
///
/// assert_eq!(config.rescale_factor, 3.0);
/// assert!(config.output_path().ends_with("reanalysis-NUTS3-Y.csv"));
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: DatasetSource,
    /// Hourly or daily concentration field.
    #[builder(into)]
    pub concentration: PathBuf,
    /// Population counts.
    #[builder(into)]
    pub population: PathBuf,
    /// Harmonized boundary GeoJSON.
    #[builder(into)]
    pub boundaries: PathBuf,
    #[builder(into)]
    pub output_dir: PathBuf,
    pub level: AdminLevel,
    pub bucket: TimeBucket,
    #[builder(default = DEFAULT_RESCALE_FACTOR)]
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f64,
    #[serde(default)]
    pub time_slice: Option<TimeSlice>,
    #[builder(default)]
    #[serde(default)]
    pub thresholds: Thresholds,
    #[builder(default)]
    #[serde(default)]
    pub layout: Layout,
    #[builder(default)]
    #[serde(default)]
    pub format: OutputFormat,
}

impl PipelineConfig {
    /// `<output_dir>/<source>-NUTS<level>-<bucket>.<ext>`. Its existence
    /// marks the run as done.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}-NUTS{}-{}.{}",
            self.source,
            self.level,
            self.bucket.code(),
            self.format.extension()
        ))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.rescale_factor.is_finite() && self.rescale_factor > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "rescale factor must be positive, got {}",
                self.rescale_factor
            )));
        }
        if let Some(slice) = &self.time_slice {
            if slice.end < slice.start {
                return Err(PipelineError::InvalidConfig(format!(
                    "time slice ends ({}) before it starts ({})",
                    slice.end, slice.start
                )));
            }
        }
        Ok(())
    }

    /// Input files this run reads, in order. Population is only read by
    /// buckets that carry it.
    pub fn inputs(&self) -> Vec<&Path> {
        let mut inputs = vec![self.boundaries.as_path(), self.concentration.as_path()];
        if self.bucket.carries_population() {
            inputs.push(self.population.as_path());
        }
        inputs
    }
}

/// A batch of runs sharing inputs, read from a JSON file.
///
/// ```json
/// {
///   "source": "forecast",
///   "concentration": "forecast-2023.grid",
///   "population": "ghsl-2020.grid",
///   "boundaries": "nuts-harmonized.geojson",
///   "output_dir": "out",
///   "levels": [0, 1, 3],
///   "buckets": ["D", "W", "Y"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub source: DatasetSource,
    pub concentration: PathBuf,
    pub population: PathBuf,
    pub boundaries: PathBuf,
    pub output_dir: PathBuf,
    pub levels: Vec<AdminLevel>,
    pub buckets: Vec<TimeBucket>,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f64,
    #[serde(default)]
    pub time_slice: Option<TimeSlice>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub format: OutputFormat,
}

impl RunPlan {
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::PlanRead(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::PlanParse(path.to_path_buf(), e))
    }

    /// One config per level and bucket, levels outermost.
    pub fn configs(&self) -> Vec<PipelineConfig> {
        self.levels
            .iter()
            .flat_map(|&level| {
                self.buckets.iter().map(move |&bucket| PipelineConfig {
                    source: self.source,
                    concentration: self.concentration.clone(),
                    population: self.population.clone(),
                    boundaries: self.boundaries.clone(),
                    output_dir: self.output_dir.clone(),
                    level,
                    bucket,
                    rescale_factor: self.rescale_factor,
                    time_slice: self.time_slice,
                    thresholds: self.thresholds.clone(),
                    layout: self.layout,
                    format: self.format,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PLAN: &str = r#"{
        "source": "reanalysis",
        "concentration": "in/pm.grid",
        "population": "in/pop.grid",
        "boundaries": "in/nuts.geojson",
        "output_dir": "out",
        "levels": [0, 3],
        "buckets": ["D", "year"],
        "format": "parquet"
    }"#;

    #[test]
    fn test_plan_expands_levels_and_buckets() {
        let plan: RunPlan = serde_json::from_str(PLAN).unwrap();
        let configs = plan.configs();
        assert_eq!(configs.len(), 4);
        assert_eq!(configs[1].level, AdminLevel::COUNTRY);
        assert_eq!(configs[1].bucket, TimeBucket::Year);
        assert_eq!(configs[0].rescale_factor, DEFAULT_RESCALE_FACTOR);
        assert_eq!(configs[0].thresholds, Thresholds::default());

        let paths: HashSet<PathBuf> = configs.iter().map(PipelineConfig::output_path).collect();
        assert_eq!(paths.len(), 4);
        assert!(paths.contains(Path::new("out/reanalysis-NUTS3-D.parquet")));
    }

    #[test]
    fn test_plan_rejects_bad_level() {
        let bad = PLAN.replace("[0, 3]", "[5]");
        assert!(serde_json::from_str::<RunPlan>(&bad).is_err());
    }

    #[test]
    fn test_validate() {
        let config = PipelineConfig::builder()
            .source(DatasetSource::Forecast)
            .concentration("c")
            .population("p")
            .boundaries("b")
            .output_dir("o")
            .level(AdminLevel::COUNTRY)
            .bucket(TimeBucket::Week)
            .build();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_path(), Path::new("o/forecast-NUTS0-W.csv"));

        let zero = PipelineConfig {
            rescale_factor: 0.0,
            ..config
        };
        assert!(matches!(zero.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_population_is_an_input_of_yearly_runs_only() {
        let weekly = PipelineConfig::builder()
            .source(DatasetSource::Reanalysis)
            .concentration("pm.nc")
            .population("ghsl.tif")
            .boundaries("nuts.geojson")
            .output_dir("out")
            .level(AdminLevel::FINEST)
            .bucket(TimeBucket::Week)
            .build();
        assert_eq!(
            weekly.inputs(),
            vec![Path::new("nuts.geojson"), Path::new("pm.nc")]
        );

        let yearly = PipelineConfig {
            bucket: TimeBucket::Year,
            ..weekly
        };
        assert_eq!(yearly.inputs().last(), Some(&Path::new("ghsl.tif")));
    }
}
