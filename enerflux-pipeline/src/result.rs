//! Pipeline execution result: per-source counters, status, and the operator
//! summary.
//!
//! Per-source maps are BTreeMaps so aggregation is independent of the order
//! in which sources finish; two runs over the same data serialize
//! identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Pending,
    Success,
    PartialSuccess,
    Failed,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineStatus::Pending => "PENDING",
            PipelineStatus::Success => "SUCCESS",
            PipelineStatus::PartialSuccess => "PARTIAL_SUCCESS",
            PipelineStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Everything one pipeline run reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: PipelineStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub records_fetched: BTreeMap<String, usize>,
    pub records_stored: BTreeMap<String, usize>,
    pub quality_scores: BTreeMap<String, f64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: String,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self {
            status: PipelineStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0.0,
            records_fetched: BTreeMap::new(),
            records_stored: BTreeMap::new(),
            quality_scores: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            summary: String::new(),
        }
    }

    /// Sources that fetched rows but stored none (fetch succeeded, then the
    /// gate or storage dropped the batch).
    fn dropped_sources(&self) -> Vec<&str> {
        self.records_fetched
            .iter()
            .filter(|(source, &fetched)| {
                fetched > 0 && self.records_stored.get(*source).copied().unwrap_or(0) == 0
            })
            .map(|(source, _)| source.as_str())
            .collect()
    }

    /// Close the run: derive the terminal status, stamp the end time, and
    /// render the summary.
    ///
    /// Success means a fully clean run; a run with at least one stored batch
    /// and at least one error or dropped source is partial; a run where
    /// something went wrong and nothing landed is failed.
    pub fn finalize(&mut self) {
        let end = Utc::now();
        self.duration_seconds = (end - self.start_time).num_milliseconds() as f64 / 1000.0;
        self.end_time = Some(end);

        let anything_stored = self.records_stored.values().any(|&n| n > 0);
        self.status = if self.errors.is_empty() && self.dropped_sources().is_empty() {
            PipelineStatus::Success
        } else if anything_stored {
            PipelineStatus::PartialSuccess
        } else {
            PipelineStatus::Failed
        };

        self.summary = self.render_summary();
    }

    /// Human-readable run summary for operators.
    fn render_summary(&self) -> String {
        let bar = "=".repeat(80);
        let mut lines: Vec<String> = Vec::new();

        lines.push(bar.clone());
        lines.push("PIPELINE EXECUTION SUMMARY".to_string());
        lines.push(bar.clone());
        lines.push(format!("Status: {}", self.status));
        lines.push(format!("Duration: {:.2} seconds", self.duration_seconds));
        lines.push(format!(
            "Start Time: {}",
            self.start_time.format("%Y-%m-%d %H:%M:%S")
        ));
        if let Some(end) = self.end_time {
            lines.push(format!("End Time: {}", end.format("%Y-%m-%d %H:%M:%S")));
        }
        lines.push(String::new());

        lines.push("Records Fetched:".to_string());
        for (source, count) in &self.records_fetched {
            lines.push(format!("  {source}: {count}"));
        }
        lines.push(format!(
            "  TOTAL: {}",
            self.records_fetched.values().sum::<usize>()
        ));
        lines.push(String::new());

        lines.push("Records Stored:".to_string());
        for (source, count) in &self.records_stored {
            lines.push(format!("  {source}: {count}"));
        }
        lines.push(format!(
            "  TOTAL: {}",
            self.records_stored.values().sum::<usize>()
        ));
        lines.push(String::new());

        if !self.quality_scores.is_empty() {
            lines.push("Quality Scores:".to_string());
            for (source, score) in &self.quality_scores {
                lines.push(format!("  {source}: {score}%"));
            }
            lines.push(String::new());
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warning in &self.warnings {
                lines.push(format!("  - {warning}"));
            }
            lines.push(String::new());
        }

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for error in &self.errors {
                lines.push(format!("  - {error}"));
            }
            lines.push(String::new());
        }

        lines.push(bar);
        lines.join("\n")
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_run_is_success() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 5);
        result.records_stored.insert("EIA".to_string(), 5);
        result.finalize();

        assert_eq!(result.status, PipelineStatus::Success);
        assert!(result.end_time.is_some());
        assert!(result.summary.contains("SUCCESS"));
    }

    #[test]
    fn error_with_other_sources_stored_is_partial() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 0);
        result.records_fetched.insert("FRED".to_string(), 100);
        result.records_stored.insert("FRED".to_string(), 100);
        result.errors.push("EIA: retries exhausted".to_string());
        result.finalize();

        assert_eq!(result.status, PipelineStatus::PartialSuccess);
    }

    #[test]
    fn gated_source_with_others_stored_is_partial() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 30);
        result.records_stored.insert("EIA".to_string(), 0); // gate dropped it
        result.records_fetched.insert("FRED".to_string(), 30);
        result.records_stored.insert("FRED".to_string(), 30);
        result.finalize();

        assert_eq!(result.status, PipelineStatus::PartialSuccess);
    }

    #[test]
    fn nothing_stored_with_errors_is_failed() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 0);
        result.errors.push("EIA: retries exhausted".to_string());
        result.finalize();

        assert_eq!(result.status, PipelineStatus::Failed);
    }

    #[test]
    fn all_empty_fetches_without_errors_is_success() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 0);
        result.records_fetched.insert("FRED".to_string(), 0);
        result.warnings.push("EIA: no data in window".to_string());
        result.finalize();

        assert_eq!(result.status, PipelineStatus::Success);
    }

    #[test]
    fn serde_round_trip_preserves_the_result() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 5);
        result.records_stored.insert("EIA".to_string(), 5);
        result.quality_scores.insert("EIA".to_string(), 98.5);
        result.warnings.push("End date in the future".to_string());
        result.finalize();

        let json = serde_json::to_string(&result).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn summary_lists_per_source_counts_and_totals() {
        let mut result = ExecutionResult::new();
        result.records_fetched.insert("EIA".to_string(), 5);
        result.records_fetched.insert("FRED".to_string(), 7);
        result.records_stored.insert("EIA".to_string(), 5);
        result.records_stored.insert("FRED".to_string(), 7);
        result.finalize();

        assert!(result.summary.contains("EIA: 5"));
        assert!(result.summary.contains("FRED: 7"));
        assert!(result.summary.contains("TOTAL: 12"));
    }
}
