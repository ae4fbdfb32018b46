//! Data validation: schema, outliers, completeness, cross-source consistency,
//! and the combined quality report.
//!
//! Every operation here is deterministic, never panics on a malformed batch,
//! and never mutates its input; outlier detection returns a columnar
//! annotation instead of rewriting records.

pub mod completeness;
pub mod cross_source;
pub mod outliers;
pub mod report;
pub mod schema;

pub use completeness::{check_completeness, CompletenessReport, Gap};
pub use cross_source::{validate_cross_source, ConsistencyReport, Discrepancy};
pub use outliers::{detect_outliers, OutlierFlags, OutlierMethod};
pub use report::{generate_quality_report, QualityLevel, QualityReport, QualityScores};
pub use schema::{validate_schema, SchemaReport};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Validation tuning, loaded from the `validation` section of the pipeline
/// configuration. Every default matches the documented operating values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Overall score below which a source's batch is dropped (inclusive pass).
    pub quality_threshold: f64,
    /// Exclude Saturdays/Sundays from expected observations (trading series).
    pub exclude_weekends: bool,
    pub outliers: OutlierConfig,
    pub completeness: CompletenessConfig,
    pub tolerances: ToleranceConfig,
    pub quality_weights: QualityWeights,
    /// Plausible price band per canonical commodity symbol; prices outside
    /// the band draw a warning, not an error.
    pub price_ranges: BTreeMap<String, PriceRange>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 70.0,
            exclude_weekends: true,
            outliers: OutlierConfig::default(),
            completeness: CompletenessConfig::default(),
            tolerances: ToleranceConfig::default(),
            quality_weights: QualityWeights::default(),
            price_ranges: default_price_ranges(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub z_score_threshold: f64,
    pub iqr_multiplier: f64,
    pub rolling_window_days: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 3.0,
            iqr_multiplier: 1.5,
            rolling_window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessConfig {
    pub max_gap_days: i64,
    pub min_data_points: usize,
    pub max_missing_rate: f64,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            max_gap_days: 2,
            min_data_points: 30,
            max_missing_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Relative price difference beyond which two sources disagree.
    pub cross_source_tolerance: f64,
    /// Relative day-over-day move beyond which a price draws a warning.
    pub max_daily_change: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            cross_source_tolerance: 0.05,
            max_daily_change: 0.50,
        }
    }
}

/// Weights for the overall quality score. They sum to 1.0 by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub completeness: f64,
    pub consistency: f64,
    pub schema_compliance: f64,
    pub outlier: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.4,
            consistency: 0.3,
            schema_compliance: 0.2,
            outlier: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

fn default_price_ranges() -> BTreeMap<String, PriceRange> {
    BTreeMap::from([
        ("WTI_CRUDE".to_string(), PriceRange { min: 0.01, max: 300.0 }),
        ("BRENT_CRUDE".to_string(), PriceRange { min: 0.01, max: 300.0 }),
        ("NATURAL_GAS".to_string(), PriceRange { min: 0.01, max: 50.0 }),
    ])
}

/// Scores are reported to two decimal places.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
