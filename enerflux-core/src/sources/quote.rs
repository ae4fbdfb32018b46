//! Futures-quote adapter (Yahoo-style v8 chart API).
//!
//! Fetches daily OHLCV bars for a ticker and exposes them through the uniform
//! series interface with `value` set to the close. Rows with no close are
//! holidays or bad prints and are dropped.

use chrono::NaiveDate;
use serde::Deserialize;

use super::cache::{CacheConfig, CacheStats, SeriesCache};
use super::http;
use super::provider::{validate_window, SeriesPoint, SourceAdapter, SourceError};
use super::retry::RetryPolicy;

/// Quote tickers mapped to canonical commodity symbols.
pub const TICKER_MAP: &[(&str, &str)] = &[
    ("CL=F", "WTI_CRUDE"),
    ("BZ=F", "BRENT_CRUDE"),
];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartSeries>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Quote-feed client. Needs no credential; still rate-limited upstream.
pub struct QuoteAdapter {
    client: reqwest::blocking::Client,
    cache: SeriesCache,
    retry: RetryPolicy,
}

impl QuoteAdapter {
    pub const BASE_URL: &'static str = "https://query2.finance.yahoo.com/v8/finance/chart";

    pub fn new(cache_config: CacheConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http::build_client()?,
            cache: SeriesCache::new(cache_config),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the default retry schedule.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let period2 = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "{}/{ticker}?period1={period1}&period2={period2}&interval=1d",
            Self::BASE_URL
        )
    }

    /// Flatten the chart arrays into dated OHLCV points, close-priced.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<SeriesPoint>, SourceError> {
        let series = resp
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| match resp.chart.error {
                Some(err) => SourceError::Parse(format!(
                    "ticker '{ticker}': {}: {}",
                    err.code, err.description
                )),
                None => SourceError::Parse(format!("ticker '{ticker}': empty chart result")),
            })?;

        // No timestamps means no bars in the window.
        let Some(timestamps) = series.timestamp else {
            return Ok(Vec::new());
        };

        let quote = series
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Parse(format!("ticker '{ticker}': no quote data")))?;

        let mut points = Vec::with_capacity(timestamps.len());
        let mut dropped = 0usize;

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    SourceError::Parse(format!("ticker '{ticker}': invalid timestamp {ts}"))
                })?;

            let close = quote.close.get(i).copied().flatten();
            let Some(close) = close else {
                dropped += 1;
                continue;
            };

            points.push(SeriesPoint {
                date,
                value: close,
                volume: quote.volume.get(i).copied().flatten(),
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close: Some(close),
            });
        }

        if dropped > 0 {
            tracing::debug!(ticker, dropped, "skipped bars without a close");
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

impl SourceAdapter for QuoteAdapter {
    fn name(&self) -> &str {
        "QUOTES"
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
            tracing::debug!(ticker = series_id, "serving quotes from cache");
            return Ok(points);
        }

        let url = Self::chart_url(series_id, window.start, window.end);
        let resp: ChartResponse = self
            .retry
            .run(deadline, |_| http::get_json(&self.client, &url, &[]))?;

        let mut points = Self::parse_response(series_id, resp)?;
        points.sort_by_key(|p| p.date);

        if points.is_empty() {
            tracing::warn!(ticker = series_id, start = %window.start, end = %window.end, "no quote bars returned");
        } else {
            tracing::info!(ticker = series_id, rows = points.len(), "fetched quote bars");
        }

        self.cache.put(&key, points.clone());
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: serde_json::Value) -> ChartResponse {
        serde_json::from_value(v).unwrap()
    }

    // 2024-01-02 and 2024-01-03, UTC midnight.
    const TS: [i64; 2] = [1_704_153_600, 1_704_240_000];

    #[test]
    fn parses_ohlcv_bars_with_close_as_value() {
        let resp = decode(json!({
            "chart": {
                "result": [{
                    "timestamp": TS,
                    "indicators": {
                        "quote": [{
                            "open": [72.0, 73.0],
                            "high": [74.0, 75.0],
                            "low": [71.0, 72.5],
                            "close": [73.5, 74.2],
                            "volume": [250000, 310000],
                        }]
                    }
                }],
                "error": null
            }
        }));

        let points = QuoteAdapter::parse_response("CL=F", resp).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 73.5);
        assert_eq!(points[0].close, Some(73.5));
        assert_eq!(points[0].open, Some(72.0));
        assert_eq!(points[0].volume, Some(250_000));
        assert_eq!(
            points[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn bars_without_close_are_dropped() {
        let resp = decode(json!({
            "chart": {
                "result": [{
                    "timestamp": TS,
                    "indicators": {
                        "quote": [{
                            "open": [72.0, 73.0],
                            "high": [74.0, 75.0],
                            "low": [71.0, 72.5],
                            "close": [null, 74.2],
                            "volume": [250000, 310000],
                        }]
                    }
                }],
                "error": null
            }
        }));

        let points = QuoteAdapter::parse_response("CL=F", resp).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 74.2);
    }

    #[test]
    fn provider_error_is_a_parse_error() {
        let resp = decode(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        }));
        let err = QuoteAdapter::parse_response("XX=F", resp).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn missing_timestamps_mean_empty_window() {
        let resp = decode(json!({
            "chart": {
                "result": [{
                    "timestamp": null,
                    "indicators": {"quote": [{
                        "open": [], "high": [], "low": [], "close": [], "volume": [],
                    }]}
                }],
                "error": null
            }
        }));
        let points = QuoteAdapter::parse_response("CL=F", resp).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn chart_url_spans_whole_days() {
        let url = QuoteAdapter::chart_url(
            "CL=F",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        assert!(url.contains("period1=1704153600"));
        assert!(url.contains("period2=1704239999"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn ticker_map_covers_canonical_symbols() {
        let wti = TICKER_MAP.iter().find(|(t, _)| *t == "CL=F").unwrap();
        assert_eq!(wti.1, "WTI_CRUDE");
    }
}
