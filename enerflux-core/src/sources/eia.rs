//! EIA open-data adapter.
//!
//! Fetches daily petroleum/natural-gas spot series from the EIA v2 API by
//! series id. Responses arrive as `{response: {data: [{period, value}…]}}`
//! with values that may be JSON numbers or numeric strings.

use chrono::NaiveDate;
use serde::Deserialize;

use super::cache::{CacheConfig, CacheStats, SeriesCache};
use super::http;
use super::provider::{validate_window, SeriesPoint, SourceAdapter, SourceError};
use super::retry::RetryPolicy;

/// EIA-native series ids mapped to canonical commodity symbols.
pub const SERIES_MAP: &[(&str, &str)] = &[
    ("PET.RWTC.D", "WTI_CRUDE"),
    ("NG.RNGWHHD.D", "NATURAL_GAS"),
];

#[derive(Debug, Deserialize)]
struct EiaResponse {
    response: Option<EiaPayload>,
}

#[derive(Debug, Deserialize)]
struct EiaPayload {
    data: Option<Vec<EiaRow>>,
}

#[derive(Debug, Deserialize)]
struct EiaRow {
    period: String,
    value: Option<serde_json::Value>,
}

/// EIA API client with per-instance cache and bounded retry.
#[derive(Debug)]
pub struct EiaAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    cache: SeriesCache,
    retry: RetryPolicy,
}

impl EiaAdapter {
    pub const BASE_URL: &'static str = "https://api.eia.gov/v2";

    /// Build an adapter. The key falls back to `EIA_API_KEY`; a missing key
    /// refuses construction.
    pub fn new(api_key: Option<String>, cache_config: CacheConfig) -> Result<Self, SourceError> {
        let api_key = api_key
            .or_else(|| std::env::var("EIA_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SourceError::Config(
                    "EIA API key is required: pass it explicitly or set EIA_API_KEY".into(),
                )
            })?;

        Ok(Self {
            client: http::build_client()?,
            api_key,
            cache: SeriesCache::new(cache_config),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the default retry schedule.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn series_url(&self, series_id: &str) -> String {
        format!("{}/seriesid/{series_id}", Self::BASE_URL)
    }

    /// Parse the v2 payload into dated points. Rows with a missing or
    /// non-numeric value are dropped; a missing envelope is a parse error.
    fn parse_response(series_id: &str, resp: EiaResponse) -> Result<Vec<SeriesPoint>, SourceError> {
        let rows = resp
            .response
            .and_then(|p| p.data)
            .ok_or_else(|| {
                SourceError::Parse(format!("series '{series_id}': missing response.data"))
            })?;

        let mut points = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in rows {
            let date = NaiveDate::parse_from_str(&row.period, "%Y-%m-%d").map_err(|e| {
                SourceError::Parse(format!(
                    "series '{series_id}': unparseable period '{}': {e}",
                    row.period
                ))
            })?;

            match row.value.as_ref().and_then(numeric_value) {
                Some(value) => points.push(SeriesPoint::plain(date, value)),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::warn!(series_id, dropped, "dropped rows with missing values");
        }
        Ok(points)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Interpret a provider value cell: numbers pass through, numeric strings are
/// parsed, sentinels ("." / "N/A" / null) mean missing.
fn numeric_value(raw: &serde_json::Value) -> Option<f64> {
    match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl SourceAdapter for EiaAdapter {
    fn name(&self) -> &str {
        "EIA"
    }

    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        deadline: Option<std::time::Instant>,
    ) -> Result<Vec<SeriesPoint>, SourceError> {
        let window = validate_window(start, end)?;

        let key = SeriesCache::key(series_id, window.start, window.end);
        if let Some(points) = self.cache.get(&key) {
            tracing::debug!(series_id, "serving EIA series from cache");
            return Ok(points);
        }

        let url = self.series_url(series_id);
        let query = [
            ("api_key", self.api_key.clone()),
            ("start", window.start.to_string()),
            ("end", window.end.to_string()),
        ];

        let resp: EiaResponse = self
            .retry
            .run(deadline, |_| http::get_json(&self.client, &url, &query))?;

        let mut points = Self::parse_response(series_id, resp)?;
        points.sort_by_key(|p| p.date);

        if points.is_empty() {
            tracing::warn!(series_id, start = %window.start, end = %window.end, "EIA returned no data");
        } else {
            tracing::info!(series_id, rows = points.len(), "fetched EIA series");
        }

        self.cache.put(&key, points.clone());
        Ok(points)
    }
}
