//! Schema validation over canonical record batches.
//!
//! The wire-level column checks of the tabular original become field checks
//! on typed records: identifiers present, prices finite and positive. Each
//! record contributes a fixed number of checks so the compliance score scales
//! with the share of violations.

use serde::{Deserialize, Serialize};

use super::{round2, ValidationConfig};
use crate::domain::PriceRecord;

/// Checks applied per record: commodity, source, price type, price sign.
const CHECKS_PER_RECORD: usize = 4;

/// Outcome of schema validation for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub valid: bool,
    /// Share of passed checks, 0–100.
    pub schema_compliance_score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate field presence, price type, and price positivity; add
/// plausibility warnings for out-of-band prices and violent daily moves.
pub fn validate_schema(batch: &[PriceRecord], config: &ValidationConfig) -> SchemaReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut failed_checks = 0usize;

    for (i, record) in batch.iter().enumerate() {
        if record.commodity.is_empty() {
            failed_checks += 1;
            errors.push(format!("VAL-006: record {i}: missing commodity symbol"));
        }
        if record.source.is_empty() {
            failed_checks += 1;
            errors.push(format!("VAL-006: record {i}: missing source name"));
        }
        if !record.price.is_finite() {
            failed_checks += 1;
            errors.push(format!(
                "VAL-001: record {i} ({}): price is not numeric",
                record.commodity
            ));
        } else if record.price <= 0.0 {
            failed_checks += 1;
            errors.push(format!(
                "VAL-001: record {i} ({} @ {}): non-positive price {}",
                record.commodity,
                record.date(),
                record.price
            ));
        } else if let Some(range) = config.price_ranges.get(&record.commodity) {
            if record.price < range.min || record.price > range.max {
                warnings.push(format!(
                    "{} @ {}: price {} outside plausible range [{}, {}]",
                    record.commodity,
                    record.date(),
                    record.price,
                    range.min,
                    range.max
                ));
            }
        }
    }

    daily_change_warnings(batch, config.tolerances.max_daily_change, &mut warnings);

    let total_checks = batch.len() * CHECKS_PER_RECORD;
    let score = if total_checks == 0 {
        100.0
    } else {
        round2((1.0 - failed_checks as f64 / total_checks as f64).max(0.0) * 100.0)
    };

    let valid = errors.is_empty();
    if !valid {
        tracing::warn!(errors = errors.len(), score, "schema validation failed");
    }

    SchemaReport {
        valid,
        schema_compliance_score: score,
        errors,
        warnings,
    }
}

/// Warn on day-over-day moves beyond the tolerance, per commodity series.
fn daily_change_warnings(batch: &[PriceRecord], max_change: f64, warnings: &mut Vec<String>) {
    if max_change <= 0.0 {
        return;
    }

    let mut by_commodity: std::collections::BTreeMap<&str, Vec<&PriceRecord>> =
        std::collections::BTreeMap::new();
    for record in batch {
        by_commodity
            .entry(record.commodity.as_str())
            .or_default()
            .push(record);
    }

    for (commodity, mut records) in by_commodity {
        records.sort_by_key(|r| r.timestamp);
        for pair in records.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.price <= 0.0 {
                continue;
            }
            let change = (next.price - prev.price).abs() / prev.price;
            if change > max_change {
                warnings.push(format!(
                    "{commodity} @ {}: daily change {:.1}% exceeds {:.0}% tolerance",
                    next.date(),
                    change * 100.0,
                    max_change * 100.0
                ));
            }
        }
    }
}
