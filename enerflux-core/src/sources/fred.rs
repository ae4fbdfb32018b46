//! FRED (Federal Reserve Economic Data) adapter.
//!
//! Fetches `series/observations` as JSON. FRED reports missing observations
//! with the string sentinel `"."`; those rows are dropped before the series
//! leaves the adapter.

use chrono::NaiveDate;
use serde::Deserialize;

use super::cache::{CacheConfig, CacheStats, SeriesCache};
use super::http;
use super::provider::{validate_window, SeriesPoint, SourceAdapter, SourceError};
use super::retry::RetryPolicy;

/// FRED-native series ids mapped to canonical commodity symbols.
pub const SERIES_MAP: &[(&str, &str)] = &[
    ("DCOILWTICO", "WTI_CRUDE"),
    ("DCOILBRENTEU", "BRENT_CRUDE"),
];

#[derive(Debug, Deserialize)]
struct FredResponse {
    observations: Option<Vec<FredObservation>>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

/// FRED API client with per-instance cache and bounded retry.
#[derive(Debug)]
pub struct FredAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    cache: SeriesCache,
    retry: RetryPolicy,
}

impl FredAdapter {
    pub const BASE_URL: &'static str = "https://api.stlouisfed.org/fred";

    /// Build an adapter. The key falls back to `FRED_API_KEY`; a missing key
    /// refuses construction.
    pub fn new(api_key: Option<String>, cache_config: CacheConfig) -> Result<Self, SourceError> {
        let api_key = api_key
            .or_else(|| std::env::var("FRED_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SourceError::Config(
                    "FRED API key is required: pass it explicitly or set FRED_API_KEY".into(),
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

    /// Parse observations into dated points, dropping `"."` sentinels and
    /// anything else that does not read as a number.
    fn parse_response(
        series_id: &str,
        resp: FredResponse,
    ) -> Result<Vec<SeriesPoint>, SourceError> {
        let observations = resp.observations.ok_or_else(|| {
            SourceError::Parse(format!("series '{series_id}': missing observations"))
        })?;

        let mut points = Vec::with_capacity(observations.len());
        let mut dropped = 0usize;

        for obs in observations {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                SourceError::Parse(format!(
                    "series '{series_id}': unparseable date '{}': {e}",
                    obs.date
                ))
            })?;

            match obs.value.trim().parse::<f64>() {
                Ok(value) => points.push(SeriesPoint::plain(date, value)),
                Err(_) => dropped += 1, // "." and friends mean missing
            }
        }

        if dropped > 0 {
            tracing::warn!(series_id, dropped, "dropped observations with missing values");
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

impl SourceAdapter for FredAdapter {
    fn name(&self) -> &str {
        "FRED"
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
            tracing::debug!(series_id, "serving FRED series from cache");
            return Ok(points);
        }

        let url = format!("{}/series/observations", Self::BASE_URL);
        let query = [
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("series_id", series_id.to_string()),
            ("observation_start", window.start.to_string()),
            ("observation_end", window.end.to_string()),
            ("sort_order", "asc".to_string()),
        ];

        let resp: FredResponse = self
            .retry
            .run(deadline, |_| http::get_json(&self.client, &url, &query))?;

        let mut points = Self::parse_response(series_id, resp)?;
        points.sort_by_key(|p| p.date);

        if points.is_empty() {
            tracing::warn!(series_id, start = %window.start, end = %window.end, "FRED returned no data");
        } else {
            tracing::info!(series_id, rows = points.len(), "fetched FRED series");
        }

        self.cache.put(&key, points.clone());
        Ok(points)
    }
}
