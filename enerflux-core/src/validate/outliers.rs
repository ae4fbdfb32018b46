//! Outlier detection over price batches.
//!
//! Two methods, each independently toggleable:
//! - rolling z-score: left-inclusive window, sample standard deviation;
//! - global IQR: quartiles with linear interpolation.
//!
//! Detection annotates; it never removes records. The returned flags are
//! columnar and index-aligned with the input batch.

use serde::{Deserialize, Serialize};

use super::OutlierConfig;
use crate::domain::PriceRecord;

/// Detection methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    ZScore,
    Iqr,
}

/// Per-record outlier flags, one entry per input record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFlags {
    pub zscore: Vec<bool>,
    pub iqr: Vec<bool>,
    /// OR of the enabled methods.
    pub any: Vec<bool>,
}

impl OutlierFlags {
    pub fn len(&self) -> usize {
        self.any.len()
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }

    /// Fraction of records flagged by any method, in [0, 1].
    pub fn outlier_rate(&self) -> f64 {
        if self.any.is_empty() {
            return 0.0;
        }
        self.any.iter().filter(|&&f| f).count() as f64 / self.any.len() as f64
    }
}

/// Annotate a batch with outlier flags for the requested methods.
pub fn detect_outliers(
    batch: &[PriceRecord],
    methods: &[OutlierMethod],
    config: &OutlierConfig,
) -> OutlierFlags {
    let prices: Vec<f64> = batch.iter().map(|r| r.price).collect();
    let n = prices.len();

    let zscore = if methods.contains(&OutlierMethod::ZScore) {
        rolling_zscore_flags(&prices, config.rolling_window_days, config.z_score_threshold)
    } else {
        vec![false; n]
    };

    let iqr = if methods.contains(&OutlierMethod::Iqr) {
        iqr_flags(&prices, config.iqr_multiplier)
    } else {
        vec![false; n]
    };

    let any: Vec<bool> = zscore.iter().zip(&iqr).map(|(&z, &q)| z || q).collect();

    let flagged = any.iter().filter(|&&f| f).count();
    if flagged > 0 {
        tracing::info!(flagged, total = n, "outliers detected");
    }

    OutlierFlags { zscore, iqr, any }
}

/// Rolling z-score: for each point, mean and sample std over the window of up
/// to `window` trailing points ending at the point itself. A window with
/// fewer than two points, or zero spread, flags nothing.
fn rolling_zscore_flags(prices: &[f64], window: usize, threshold: f64) -> Vec<bool> {
    let window = window.max(1);
    prices
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let start = (i + 1).saturating_sub(window);
            let slice = &prices[start..=i];
            if slice.len() < 2 {
                return false;
            }
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let var = slice.iter().map(|p| (p - mean).powi(2)).sum::<f64>()
                / (slice.len() - 1) as f64;
            let std = var.sqrt();
            if std <= 0.0 {
                return false;
            }
            ((x - mean) / std).abs() > threshold
        })
        .collect()
}

/// Global IQR fences: `[Q1 − k·IQR, Q3 + k·IQR]`.
fn iqr_flags(prices: &[f64], multiplier: f64) -> Vec<bool> {
    if prices.len() < 2 {
        return vec![false; prices.len()];
    }

    let q1 = quantile(prices, 0.25);
    let q3 = quantile(prices, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;

    prices.iter().map(|&x| x < lower || x > upper).collect()
}

/// Quantile with linear interpolation between order statistics.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
