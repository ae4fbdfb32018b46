//! Source adapters: one HTTP client per upstream provider.
//!
//! Each adapter owns its session, credential, retry policy, and TTL cache,
//! and exposes the uniform [`provider::SourceAdapter`] capability.

pub mod cache;
pub mod eia;
pub mod fred;
mod http;
pub mod provider;
pub mod quote;
pub mod retry;

pub use cache::{CacheConfig, CacheStats, SeriesCache};
pub use eia::EiaAdapter;
pub use fred::FredAdapter;
pub use provider::{validate_window, DateWindow, SeriesPoint, SourceAdapter, SourceError};
pub use quote::QuoteAdapter;
pub use retry::RetryPolicy;

/// User-Agent sent by every adapter.
pub const USER_AGENT: &str = concat!("enerflux/", env!("CARGO_PKG_VERSION"));

/// Per-request HTTP timeout, independent of any pipeline deadline.
pub const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
