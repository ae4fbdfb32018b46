//! Source adapter trait and structured error types.
//!
//! The SourceAdapter trait abstracts over upstream providers (EIA, FRED,
//! quote feeds) so the orchestrator can drive them uniformly and tests can
//! substitute mocks.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One provider observation: a dated value, with OHLCV when the provider has it.
///
/// Plain series providers (EIA, FRED) leave the optional fields empty; the
/// quote adapter fills them and sets `value` to the close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub volume: Option<u64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl SeriesPoint {
    /// A bare `{date, value}` observation.
    pub fn plain(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            volume: None,
            open: None,
            high: None,
            low: None,
            close: None,
        }
    }

    /// Promote to a canonical record under a mapped symbol and source name.
    pub fn into_record(self, commodity: &str, source: &str) -> crate::domain::PriceRecord {
        crate::domain::PriceRecord {
            timestamp: crate::domain::utc_midnight(self.date),
            commodity: commodity.to_string(),
            source: source.to_string(),
            price: self.value,
            volume: self.volume,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// Structured error taxonomy for source adapters.
///
/// Only `Transient` is retried; everything else propagates immediately.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("unrecognized provider response: {0}")]
    Parse(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl SourceError {
    /// Whether the retry loop may try again on this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Result of clamping a requested date range against "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// True when the requested end was in the future and got pulled back.
    pub end_clamped: bool,
}

/// Validate a requested window: `start ≤ end`, future end clamped to today.
///
/// A future end is a warning, not an error; the provider cannot have data past
/// today anyway.
pub fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<DateWindow, SourceError> {
    if start > end {
        return Err(SourceError::Validation(format!(
            "start date ({start}) must be before or equal to end date ({end})"
        )));
    }

    let today = Utc::now().date_naive();
    if end > today {
        tracing::warn!(%end, %today, "end date is in the future; clamping to today");
        let clamped_start = start.min(today);
        return Ok(DateWindow {
            start: clamped_start,
            end: today,
            end_clamped: true,
        });
    }

    Ok(DateWindow {
        start,
        end,
        end_clamped: false,
    })
}

/// Trait for upstream price/indicator providers.
///
/// Implementations own their HTTP session, credential, and response cache.
/// `fetch_series` returns observations sorted ascending by date with missing
/// values already dropped; an empty window yields an empty vector, not an
/// error.
pub trait SourceAdapter: Send + Sync {
    /// Stable source name used in records, storage, and reports.
    fn name(&self) -> &str;

    /// Fetch one provider-native series over a date range.
    ///
    /// `deadline` bounds retries, not requests: a transient failure past the
    /// deadline is not retried, while an in-flight request runs to its own
    /// HTTP timeout.
    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        deadline: Option<std::time::Instant>,
    ) -> Result<Vec<SeriesPoint>, SourceError>;
}
