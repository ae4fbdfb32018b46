//! Pipeline configuration: YAML surface with typed defaults.
//!
//! Loaded once at startup and passed by reference; nothing mutates it after
//! that. A missing file falls back to the built-in defaults with a warning.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use enerflux_core::validate::ValidationConfig;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Fetch-window mode for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Start right after the latest stored timestamp.
    Incremental,
    /// Re-fetch the whole lookback window.
    FullRefresh,
    /// Like full refresh; used for deliberate history repair.
    Backfill,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunMode::Incremental => "incremental",
            RunMode::FullRefresh => "full_refresh",
            RunMode::Backfill => "backfill",
        };
        f.write_str(s)
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineInfo,
    pub data_sources: DataSourcesConfig,
    pub date_range: DateRangeConfig,
    pub validation: ValidationConfig,
    pub storage: StorageConfig,
    pub error_handling: ErrorHandlingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineInfo::default(),
            data_sources: DataSourcesConfig::default(),
            date_range: DateRangeConfig::default(),
            validation: ValidationConfig::default(),
            storage: StorageConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInfo {
    pub name: String,
    pub version: String,
}

impl Default for PipelineInfo {
    fn default() -> Self {
        Self {
            name: "Energy Price Data Pipeline".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// Per-provider toggles. Each provider lists its native identifiers:
/// canonical commodity symbols for EIA, series ids for FRED, tickers for the
/// quote feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourcesConfig {
    pub eia: EiaSourceConfig,
    pub fred: FredSourceConfig,
    pub quotes: QuoteSourceConfig,
}

impl Default for DataSourcesConfig {
    fn default() -> Self {
        Self {
            eia: EiaSourceConfig::default(),
            fred: FredSourceConfig::default(),
            quotes: QuoteSourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EiaSourceConfig {
    pub enabled: bool,
    pub commodities: Vec<String>,
}

impl Default for EiaSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            commodities: vec!["WTI_CRUDE".to_string(), "NATURAL_GAS".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FredSourceConfig {
    pub enabled: bool,
    pub series: Vec<String>,
}

impl Default for FredSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            series: vec!["DCOILWTICO".to_string(), "DCOILBRENTEU".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteSourceConfig {
    pub enabled: bool,
    pub tickers: Vec<String>,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tickers: vec!["CL=F".to_string(), "BZ=F".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRangeConfig {
    pub mode: RunMode,
    pub lookback_days: i64,
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Incremental,
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Rows bound per multi-row insert statement.
    pub batch_size: usize,
    /// Overwrite on natural-key conflict; false skips duplicates instead.
    pub upsert: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            upsert: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    pub retry_attempts: u32,
    pub continue_on_partial_failure: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            continue_on_partial_failure: true,
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Load from a YAML file if given, otherwise the built-in defaults.
    /// A present-but-broken file is an error; a missing path is not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                tracing::warn!(path = %p.display(), "config file not found; using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_three_sources() {
        let config = PipelineConfig::default();
        assert!(config.data_sources.eia.enabled);
        assert!(config.data_sources.fred.enabled);
        assert!(config.data_sources.quotes.enabled);
        assert_eq!(config.date_range.mode, RunMode::Incremental);
        assert_eq!(config.date_range.lookback_days, 30);
        assert_eq!(config.validation.quality_threshold, 70.0);
        assert!(config.storage.upsert);
    }

    #[test]
    fn parses_the_documented_yaml_surface() {
        let yaml = r#"
pipeline:
  name: Energy Price Data Pipeline
  version: "1.0"
data_sources:
  eia:
    enabled: true
    commodities: [WTI_CRUDE]
  fred:
    enabled: false
    series: [DCOILWTICO]
  quotes:
    enabled: true
    tickers: ["CL=F"]
date_range:
  mode: full_refresh
  lookback_days: 90
validation:
  quality_threshold: 80
  exclude_weekends: false
  outliers:
    z_score_threshold: 2.5
    iqr_multiplier: 2.0
    rolling_window_days: 20
  completeness:
    max_gap_days: 3
    min_data_points: 10
    max_missing_rate: 0.1
  tolerances:
    cross_source_tolerance: 0.02
    max_daily_change: 0.25
  quality_weights:
    completeness: 0.25
    consistency: 0.25
    schema_compliance: 0.25
    outlier: 0.25
storage:
  batch_size: 500
  upsert: false
error_handling:
  retry_attempts: 5
  continue_on_partial_failure: false
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.data_sources.fred.enabled);
        assert_eq!(config.date_range.mode, RunMode::FullRefresh);
        assert_eq!(config.date_range.lookback_days, 90);
        assert_eq!(config.validation.quality_threshold, 80.0);
        assert!(!config.validation.exclude_weekends);
        assert_eq!(config.validation.outliers.z_score_threshold, 2.5);
        assert_eq!(config.validation.completeness.max_gap_days, 3);
        assert_eq!(config.validation.tolerances.cross_source_tolerance, 0.02);
        assert_eq!(config.storage.batch_size, 500);
        assert!(!config.storage.upsert);
        assert!(!config.error_handling.continue_on_partial_failure);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = r#"
data_sources:
  fred:
    enabled: false
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.data_sources.fred.enabled);
        assert!(config.data_sources.eia.enabled); // default
        assert_eq!(config.validation.quality_threshold, 70.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            PipelineConfig::load_or_default(Some(Path::new("/nonexistent/pipeline.yaml"))).unwrap();
        assert_eq!(config.date_range.lookback_days, 30);
    }

    #[test]
    fn mode_names_are_snake_case() {
        assert_eq!(
            serde_yaml::from_str::<RunMode>("full_refresh").unwrap(),
            RunMode::FullRefresh
        );
        assert_eq!(RunMode::FullRefresh.to_string(), "full_refresh");
    }
}
