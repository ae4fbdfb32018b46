//! Cross-source consistency: do two providers agree on the same commodity?
//!
//! Batches are inner-joined on timestamp; rows whose relative difference
//! exceeds the tolerance become discrepancies. Disagreement is a report
//! signal only — both sources' rows are still stored under their own names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::round2;
use crate::domain::PriceRecord;

/// Cap on the discrepancy list carried in a report.
const MAX_DISCREPANCIES: usize = 100;

/// One timestamp where two sources disagree beyond tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub timestamp: DateTime<Utc>,
    pub value_a: f64,
    pub value_b: f64,
    pub difference: f64,
    pub pct_difference: f64,
    pub code: String,
}

/// Outcome of comparing two sources over their common timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// `100 · (1 − discrepancy_rate)`; 0 when there is no overlap.
    pub consistency_score: f64,
    /// First discrepancies, capped for report size.
    pub discrepancies: Vec<Discrepancy>,
    pub total_discrepancies: usize,
    pub common_timestamps: usize,
    pub avg_difference: f64,
    pub max_difference: f64,
    pub tolerance_used: f64,
}

/// Compare two single-commodity batches on their shared timestamps.
pub fn validate_cross_source(
    batch_a: &[PriceRecord],
    batch_b: &[PriceRecord],
    tolerance: f64,
) -> ConsistencyReport {
    let by_timestamp: BTreeMap<DateTime<Utc>, f64> =
        batch_a.iter().map(|r| (r.timestamp, r.price)).collect();

    let mut discrepancies = Vec::new();
    let mut total_discrepancies = 0usize;
    let mut common = 0usize;
    let mut sum_diff = 0.0;
    let mut max_diff = 0.0f64;

    for b in batch_b {
        let Some(&a_price) = by_timestamp.get(&b.timestamp) else {
            continue;
        };
        common += 1;

        let difference = (a_price - b.price).abs();
        sum_diff += difference;
        max_diff = max_diff.max(difference);

        let pct_difference = if a_price != 0.0 {
            difference / a_price.abs()
        } else {
            f64::INFINITY
        };

        if pct_difference > tolerance {
            total_discrepancies += 1;
            if discrepancies.len() < MAX_DISCREPANCIES {
                discrepancies.push(Discrepancy {
                    timestamp: b.timestamp,
                    value_a: a_price,
                    value_b: b.price,
                    difference,
                    pct_difference,
                    code: "VAL-010".to_string(),
                });
            }
        }
    }

    if common == 0 {
        tracing::warn!("no common timestamps between sources");
        return ConsistencyReport {
            consistency_score: 0.0,
            discrepancies: Vec::new(),
            total_discrepancies: 0,
            common_timestamps: 0,
            avg_difference: 0.0,
            max_difference: 0.0,
            tolerance_used: tolerance,
        };
    }

    let discrepancy_rate = total_discrepancies as f64 / common as f64;
    let consistency_score = round2((1.0 - discrepancy_rate) * 100.0);

    tracing::debug!(
        consistency_score,
        total_discrepancies,
        common,
        "cross-source comparison finished"
    );

    ConsistencyReport {
        consistency_score,
        discrepancies,
        total_discrepancies,
        common_timestamps: common,
        avg_difference: (sum_diff / common as f64 * 10_000.0).round() / 10_000.0,
        max_difference: max_diff,
        tolerance_used: tolerance,
    }
}
