//! Canonical domain types shared by adapters, validator, and storage.
//!
//! A `PriceRecord` is the unit of ingestion: one observation of one commodity
//! from one source at one UTC instant. The natural key across the whole system
//! is `(timestamp, commodity, source)`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Canonical price observation (after provider normalization and symbol mapping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Observation instant, always UTC. Daily series use UTC midnight.
    pub timestamp: DateTime<Utc>,
    /// Canonical commodity symbol (e.g. "WTI_CRUDE"), never a provider-native id.
    pub commodity: String,
    /// Source name (e.g. "EIA", "FRED", "QUOTES").
    pub source: String,
    /// Settlement/spot price. Must be positive for a record to be storable.
    pub price: f64,
    pub volume: Option<u64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl PriceRecord {
    /// Build a plain (non-OHLC) record from a date and price.
    pub fn new(date: NaiveDate, commodity: &str, source: &str, price: f64) -> Self {
        Self {
            timestamp: utc_midnight(date),
            commodity: commodity.to_string(),
            source: source.to_string(),
            price,
            volume: None,
            open: None,
            high: None,
            low: None,
            close: None,
        }
    }

    /// Calendar date of the observation (UTC).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Long-lived commodity reference, created by storage on first sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
}

impl Commodity {
    /// Minimal commodity with the symbol doubling as its name.
    pub fn from_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            description: None,
            unit: None,
        }
    }
}

/// Long-lived data source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

impl SourceInfo {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            base_url: None,
            api_version: None,
        }
    }
}

/// Interpret a calendar date as a UTC instant (midnight).
///
/// Naive provider dates are assumed UTC; aware timestamps are converted by the
/// caller before they reach this layer.
pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

/// Sort a batch ascending by timestamp, then commodity, then source.
///
/// Validation and storage both rely on ascending delivery within a source.
pub fn sort_batch(batch: &mut [PriceRecord]) {
    batch.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.commodity.cmp(&b.commodity))
            .then_with(|| a.source.cmp(&b.source))
    });
}

/// First and last observation dates of a batch, if non-empty.
pub fn date_span(batch: &[PriceRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = batch.iter().map(PriceRecord::date).min()?;
    let max = batch.iter().map(PriceRecord::date).max()?;
    Some((min, max))
}
