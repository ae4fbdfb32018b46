//! Combined quality report: weighted score, level, recommendations.
//!
//! The report is the quality gate's input and the only validator artifact
//! that leaves a pipeline run (serialized or rendered for operators).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    round2, CompletenessReport, OutlierFlags, SchemaReport, ValidationConfig,
};
use crate::domain::{date_span, PriceRecord};

/// Discretized quality of a source's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Unusable,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            QualityLevel::Excellent
        } else if score >= 85.0 {
            QualityLevel::Good
        } else if score >= 70.0 {
            QualityLevel::Fair
        } else if score >= 50.0 {
            QualityLevel::Poor
        } else {
            QualityLevel::Unusable
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QualityLevel::Excellent => "EXCELLENT",
            QualityLevel::Good => "GOOD",
            QualityLevel::Fair => "FAIR",
            QualityLevel::Poor => "POOR",
            QualityLevel::Unusable => "UNUSABLE",
        };
        f.write_str(s)
    }
}

/// The four sub-scores feeding the weighted overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityScores {
    pub schema_compliance: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub outlier: f64,
}

/// Per-source quality report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub overall_quality_score: f64,
    pub quality_level: QualityLevel,
    pub total_records: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub scores: QualityScores,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Collapse sub-results into the weighted report.
///
/// `consistency` is `None` when the source had no overlapping peer; the
/// neutral score 100 applies, as for a single-source run.
pub fn generate_quality_report(
    source: &str,
    batch: &[PriceRecord],
    schema: &SchemaReport,
    completeness: &CompletenessReport,
    consistency: Option<f64>,
    outliers: &OutlierFlags,
    config: &ValidationConfig,
) -> QualityReport {
    let consistency_score = consistency.unwrap_or(100.0);
    let outlier_score = round2((1.0 - outliers.outlier_rate()) * 100.0);

    let w = &config.quality_weights;
    let weighted = w.completeness * completeness.completeness_score
        + w.consistency * consistency_score
        + w.schema_compliance * schema.schema_compliance_score
        + w.outlier * outlier_score;
    let overall = round2(weighted.clamp(0.0, 100.0));

    let scores = QualityScores {
        schema_compliance: schema.schema_compliance_score,
        completeness: completeness.completeness_score,
        consistency: consistency_score,
        outlier: outlier_score,
    };

    let mut warnings = schema.warnings.clone();
    warnings.extend(completeness.warnings.iter().cloned());

    let level = QualityLevel::from_score(overall);
    tracing::info!(source, overall, %level, "quality report generated");

    QualityReport {
        source: source.to_string(),
        generated_at: Utc::now(),
        overall_quality_score: overall,
        quality_level: level,
        total_records: batch.len(),
        date_range: date_span(batch),
        scores,
        errors: schema.errors.clone(),
        warnings,
        recommendations: recommendations(overall, schema, completeness, consistency),
    }
}

/// Actionable next steps derived from which sub-scores are weak.
fn recommendations(
    overall: f64,
    schema: &SchemaReport,
    completeness: &CompletenessReport,
    consistency: Option<f64>,
) -> Vec<String> {
    let mut recs = Vec::new();

    if overall >= 95.0 {
        recs.push("Data quality is excellent. Proceed with analysis.".to_string());
    } else if overall >= 85.0 {
        recs.push("Data quality is good. Minor cleanup recommended.".to_string());
    } else if overall >= 70.0 {
        recs.push("Data quality is fair. Investigate and resolve issues before use.".to_string());
    } else {
        recs.push(
            "Data quality is poor. Extensive cleanup or alternative sources needed.".to_string(),
        );
    }

    if !schema.errors.is_empty() {
        recs.push("Fix schema errors: missing fields or type mismatches.".to_string());
    }
    if completeness.gap_count > 0 {
        recs.push("Address data gaps in time series.".to_string());
    }
    if consistency.is_some_and(|c| c < 100.0) {
        recs.push("Investigate cross-source discrepancies.".to_string());
    }

    recs
}

impl QualityReport {
    /// Operator-readable report block.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let bar = "=".repeat(80);

        out.push_str(&bar);
        out.push_str("\nDATA QUALITY REPORT\n");
        out.push_str(&bar);
        out.push_str(&format!("\n\nSource: {}\n", self.source));
        out.push_str(&format!("Generated: {}\n\n", self.generated_at.to_rfc3339()));

        out.push_str("SUMMARY:\n");
        out.push_str(&format!(
            "  Overall Quality Score: {}\n",
            self.overall_quality_score
        ));
        out.push_str(&format!("  Quality Level: {}\n", self.quality_level));
        out.push_str(&format!("  Total Records: {}\n\n", self.total_records));

        out.push_str("DETAILED SCORES:\n");
        out.push_str(&format!(
            "  Schema Compliance: {}\n",
            self.scores.schema_compliance
        ));
        out.push_str(&format!("  Completeness: {}\n", self.scores.completeness));
        out.push_str(&format!("  Consistency: {}\n", self.scores.consistency));
        out.push_str(&format!("  Outlier: {}\n", self.scores.outlier));

        out.push_str("\nRECOMMENDATIONS:\n");
        for (i, rec) in self.recommendations.iter().enumerate() {
            out.push_str(&format!("  {}. {rec}\n", i + 1));
        }

        out.push('\n');
        out.push_str(&bar);
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{
        check_completeness, detect_outliers, validate_schema, OutlierMethod,
    };
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn trading_week_batch() -> Vec<PriceRecord> {
        [
            "2024-01-08",
            "2024-01-09",
            "2024-01-10",
            "2024-01-11",
            "2024-01-12",
        ]
        .iter()
        .map(|s| PriceRecord::new(d(s), "WTI_CRUDE", "EIA", 77.0))
        .collect()
    }

    fn report_for(batch: &[PriceRecord], consistency: Option<f64>) -> QualityReport {
        let config = ValidationConfig::default();
        let schema = validate_schema(batch, &config);
        let completeness = check_completeness(batch, true, &config.completeness);
        let outliers = detect_outliers(
            batch,
            &[OutlierMethod::ZScore, OutlierMethod::Iqr],
            &config.outliers,
        );
        generate_quality_report(
            "EIA",
            batch,
            &schema,
            &completeness,
            consistency,
            &outliers,
            &config,
        )
    }

    #[test]
    fn clean_week_is_excellent() {
        let report = report_for(&trading_week_batch(), None);
        assert_eq!(report.overall_quality_score, 100.0);
        assert_eq!(report.quality_level, QualityLevel::Excellent);
        assert_eq!(report.total_records, 5);
        assert_eq!(
            report.date_range,
            Some((d("2024-01-08"), d("2024-01-12")))
        );
    }

    #[test]
    fn consistency_drags_the_weighted_score() {
        // 0.4·100 + 0.3·70 + 0.2·100 + 0.1·100 = 91
        let report = report_for(&trading_week_batch(), Some(70.0));
        assert_eq!(report.overall_quality_score, 91.0);
        assert_eq!(report.quality_level, QualityLevel::Good);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("cross-source")));
    }

    #[test]
    fn level_thresholds_are_inclusive() {
        assert_eq!(QualityLevel::from_score(95.0), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(94.99), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(85.0), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(70.0), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(50.0), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_score(49.99), QualityLevel::Unusable);
    }

    #[test]
    fn gap_recommendation_appears_with_gaps() {
        let batch: Vec<PriceRecord> = ["2024-01-08", "2024-01-19"]
            .iter()
            .map(|s| PriceRecord::new(d(s), "WTI_CRUDE", "EIA", 77.0))
            .collect();
        let report = report_for(&batch, None);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("data gaps")));
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = report_for(&trading_week_batch(), Some(70.0));
        let json = serde_json::to_string(&report).unwrap();
        let back: QualityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.overall_quality_score, report.overall_quality_score);
        assert_eq!(back.quality_level, report.quality_level);
        assert_eq!(back.recommendations, report.recommendations);
    }

    #[test]
    fn render_text_carries_the_headline_numbers() {
        let report = report_for(&trading_week_batch(), None);
        let text = report.render_text();
        assert!(text.contains("DATA QUALITY REPORT"));
        assert!(text.contains("Overall Quality Score: 100"));
        assert!(text.contains("Quality Level: EXCELLENT"));
    }
}
