//! In-process TTL cache for provider responses.
//!
//! Keyed by a BLAKE3 hash of `series_id|start|end`. Entries expire lazily on
//! access; a size cap bounds memory. Each adapter owns its own cache instance
//! and hands out defensive copies so cached batches are immutable in practice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;

use super::provider::SeriesPoint;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default bound on cached responses per adapter.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Cache tuning for one adapter instance.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Default config with the TTL taken from `CACHE_TTL_MINUTES` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("CACHE_TTL_MINUTES") {
            match raw.parse::<u64>() {
                Ok(minutes) => config.ttl = Duration::from_secs(minutes * 60),
                Err(_) => tracing::warn!(%raw, "ignoring unparseable CACHE_TTL_MINUTES"),
            }
        }
        config
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Cache introspection counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub ttl_minutes: f64,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

#[derive(Debug)]
struct CacheEntry {
    points: Vec<SeriesPoint>,
    stored_at: Instant,
}

/// TTL response cache owned by a single adapter.
#[derive(Debug)]
pub struct SeriesCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SeriesCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Stable cache key for a series request.
    pub fn key(series_id: &str, start: NaiveDate, end: NaiveDate) -> String {
        blake3::hash(format!("{series_id}|{start}|{end}").as_bytes())
            .to_hex()
            .to_string()
    }

    /// Look up a fresh entry, returning a copy. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<Vec<SeriesPoint>> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            let age = entry.stored_at.elapsed();
            if age < self.config.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, age_secs = age.as_secs_f64(), "cache hit");
                return Some(entry.points.clone());
            }
            tracing::debug!(key, "cache entry expired");
            entries.remove(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response. Evicts expired entries first, then the oldest, to
    /// stay within the configured bound.
    pub fn put(&self, key: &str, points: Vec<SeriesPoint>) {
        if !self.config.enabled {
            return;
        }

        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.config.max_entries {
            let ttl = self.config.ttl;
            entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        }
        if entries.len() >= self.config.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        tracing::debug!(key, rows = points.len(), "cache store");
        entries.insert(
            key.to_string(),
            CacheEntry {
                points,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every cached entry. Counters are preserved.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate_percent = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            enabled: self.config.enabled,
            ttl_minutes: self.config.ttl.as_secs_f64() / 60.0,
            size: self.entries.lock().unwrap().len(),
            hits,
            misses,
            hit_rate_percent,
        }
    }
}
