//! Enerflux Pipeline — configuration, SQLite storage, run orchestration.
//!
//! The orchestrator drives the source adapters from `enerflux-core` through
//! fetch → validate → gate → store and reports each run as an
//! `ExecutionResult`.

pub mod config;
pub mod orchestrator;
pub mod result;
pub mod store;

pub use config::{PipelineConfig, RunMode};
pub use orchestrator::{build_sources, Orchestrator, RunOptions, SeriesMapping, SourceSpec};
pub use result::{ExecutionResult, PipelineStatus};
pub use store::{PriceStatistics, SqliteStore, StoreError};
