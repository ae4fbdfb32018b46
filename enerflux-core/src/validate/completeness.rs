//! Completeness checks: expected-vs-actual observation counts and gap
//! enumeration over a batch's date span.
//!
//! Expected counts assume a daily series, optionally skipping weekends for
//! trading data. A batch may carry several commodities from one source; each
//! commodity is its own daily series, so expectations scale with the number
//! of distinct symbols and gaps are enumerated per symbol.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{round2, CompletenessConfig};
use crate::domain::PriceRecord;

/// A hole in a commodity's daily series longer than the configured maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub commodity: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub gap_days: i64,
    pub code: String,
}

/// Outcome of the completeness check for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// `100 · actual / expected`; 0 for an empty batch.
    pub completeness_score: f64,
    pub total_records: usize,
    pub expected_records: usize,
    pub missing_records: i64,
    pub gaps: Vec<Gap>,
    pub gap_count: usize,
    pub exclude_weekends: bool,
    pub warnings: Vec<String>,
}

/// Count expected observations over the batch's span and enumerate gaps.
pub fn check_completeness(
    batch: &[PriceRecord],
    exclude_weekends: bool,
    config: &CompletenessConfig,
) -> CompletenessReport {
    if batch.is_empty() {
        return CompletenessReport {
            completeness_score: 0.0,
            total_records: 0,
            expected_records: 0,
            missing_records: 0,
            gaps: Vec::new(),
            gap_count: 0,
            exclude_weekends,
            warnings: Vec::new(),
        };
    }

    let mut dates_by_commodity: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
    for record in batch {
        dates_by_commodity
            .entry(record.commodity.as_str())
            .or_default()
            .push(record.date());
    }

    let mut gaps = Vec::new();
    let mut expected_records = 0usize;

    for (commodity, dates) in &mut dates_by_commodity {
        dates.sort_unstable();
        dates.dedup();

        let (first, last) = (dates[0], *dates.last().unwrap());
        expected_records += expected_observations(first, last, exclude_weekends);

        for pair in dates.windows(2) {
            let gap_days = (pair[1] - pair[0]).num_days();
            if gap_days > config.max_gap_days {
                gaps.push(Gap {
                    commodity: commodity.to_string(),
                    start: pair[0],
                    end: pair[1],
                    gap_days,
                    code: "VAL-007".to_string(),
                });
            }
        }
    }

    let total_records = batch.len();
    let missing_records = expected_records as i64 - total_records as i64;
    let completeness_score = if expected_records > 0 {
        round2(total_records as f64 / expected_records as f64 * 100.0)
    } else {
        0.0
    };

    let mut warnings = Vec::new();
    if total_records < config.min_data_points {
        warnings.push(format!(
            "only {total_records} records; at least {} are needed for reliable statistics",
            config.min_data_points
        ));
    }
    if expected_records > 0 {
        let missing_rate = missing_records.max(0) as f64 / expected_records as f64;
        if missing_rate > config.max_missing_rate {
            warnings.push(format!(
                "missing rate {:.1}% exceeds {:.1}% tolerance",
                missing_rate * 100.0,
                config.max_missing_rate * 100.0
            ));
        }
    }

    tracing::debug!(
        completeness_score,
        gap_count = gaps.len(),
        "completeness check finished"
    );

    CompletenessReport {
        completeness_score,
        total_records,
        expected_records,
        missing_records,
        gap_count: gaps.len(),
        gaps,
        exclude_weekends,
        warnings,
    }
}

/// Number of expected daily observations in `[first, last]`.
fn expected_observations(first: NaiveDate, last: NaiveDate, exclude_weekends: bool) -> usize {
    let mut count = 0usize;
    let mut day = first;
    while day <= last {
        if !exclude_weekends || !is_weekend(day) {
            count += 1;
        }
        day += chrono::Duration::days(1);
    }
    count
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn daily_batch(dates: &[&str]) -> Vec<PriceRecord> {
        dates
            .iter()
            .map(|s| PriceRecord::new(d(s), "WTI_CRUDE", "EIA", 77.0))
            .collect()
    }

    #[test]
    fn full_trading_week_is_complete() {
        // Mon 2024-01-08 .. Fri 2024-01-12
        let batch = daily_batch(&[
            "2024-01-08",
            "2024-01-09",
            "2024-01-10",
            "2024-01-11",
            "2024-01-12",
        ]);
        let report = check_completeness(&batch, true, &CompletenessConfig::default());
        assert_eq!(report.expected_records, 5);
        assert_eq!(report.completeness_score, 100.0);
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn weekend_days_count_when_not_excluded() {
        let batch = daily_batch(&["2024-01-08", "2024-01-12"]);
        let report = check_completeness(&batch, false, &CompletenessConfig::default());
        assert_eq!(report.expected_records, 5);
        assert_eq!(report.completeness_score, 40.0);
    }

    #[test]
    fn long_hole_is_a_val_007_gap() {
        let batch = daily_batch(&["2024-01-08", "2024-01-15"]);
        let report = check_completeness(&batch, true, &CompletenessConfig::default());
        assert_eq!(report.gap_count, 1);
        assert_eq!(report.gaps[0].gap_days, 7);
        assert_eq!(report.gaps[0].code, "VAL-007");
        assert_eq!(report.gaps[0].start, d("2024-01-08"));
    }

    #[test]
    fn short_holes_are_tolerated() {
        // Fri → Mon is a 3-day diff; raising max_gap_days covers weekends.
        let config = CompletenessConfig {
            max_gap_days: 3,
            ..CompletenessConfig::default()
        };
        let batch = daily_batch(&["2024-01-12", "2024-01-15"]);
        let report = check_completeness(&batch, true, &config);
        assert_eq!(report.gap_count, 0);
    }

    #[test]
    fn empty_batch_scores_zero() {
        let report = check_completeness(&[], true, &CompletenessConfig::default());
        assert_eq!(report.completeness_score, 0.0);
        assert_eq!(report.expected_records, 0);
    }

    #[test]
    fn injecting_gaps_never_raises_the_score() {
        let full = daily_batch(&[
            "2024-01-08",
            "2024-01-09",
            "2024-01-10",
            "2024-01-11",
            "2024-01-12",
        ]);
        let gappy = daily_batch(&["2024-01-08", "2024-01-12"]);

        let full_score =
            check_completeness(&full, true, &CompletenessConfig::default()).completeness_score;
        let gappy_score =
            check_completeness(&gappy, true, &CompletenessConfig::default()).completeness_score;
        assert!(gappy_score < full_score);
    }

    #[test]
    fn sparse_batch_warns_about_minimum_points() {
        let batch = daily_batch(&["2024-01-08", "2024-01-09"]);
        let report = check_completeness(&batch, true, &CompletenessConfig::default());
        assert!(report.warnings.iter().any(|w| w.contains("at least 30")));
    }

    #[test]
    fn two_commodities_double_the_expectation() {
        let mut batch = daily_batch(&["2024-01-08", "2024-01-09"]);
        batch.extend(
            ["2024-01-08", "2024-01-09"]
                .iter()
                .map(|s| PriceRecord::new(d(s), "BRENT_CRUDE", "EIA", 80.0)),
        );
        let report = check_completeness(&batch, true, &CompletenessConfig::default());
        assert_eq!(report.expected_records, 4);
        assert_eq!(report.completeness_score, 100.0);
    }

    #[test]
    fn single_day_window_is_complete() {
        let batch = daily_batch(&["2024-01-10"]);
        let report = check_completeness(&batch, true, &CompletenessConfig::default());
        assert_eq!(report.expected_records, 1);
        assert_eq!(report.completeness_score, 100.0);
    }
}
