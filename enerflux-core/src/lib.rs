//! Enerflux Core — canonical records, source adapters, data validator.
//!
//! This crate contains the provider-facing half of the ingestion pipeline:
//! - Canonical domain types (`PriceRecord`, commodity/source references)
//! - The `SourceAdapter` capability with three concrete HTTP adapters
//!   (EIA, FRED, quote feed), each with retry, TTL cache, and sentinel
//!   normalization
//! - The validator: schema, outliers, completeness, cross-source
//!   consistency, and the combined quality report

pub mod domain;
pub mod sources;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the orchestrator moves across its
    /// worker pool is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceRecord>();
        require_sync::<domain::PriceRecord>();
        require_send::<domain::Commodity>();
        require_sync::<domain::Commodity>();

        require_send::<sources::SeriesPoint>();
        require_sync::<sources::SeriesPoint>();
        require_send::<sources::SourceError>();
        require_sync::<sources::SourceError>();
        require_send::<sources::SeriesCache>();
        require_sync::<sources::SeriesCache>();
        require_send::<sources::EiaAdapter>();
        require_sync::<sources::EiaAdapter>();
        require_send::<sources::FredAdapter>();
        require_sync::<sources::FredAdapter>();
        require_send::<sources::QuoteAdapter>();
        require_sync::<sources::QuoteAdapter>();

        require_send::<validate::QualityReport>();
        require_sync::<validate::QualityReport>();
        require_send::<validate::ValidationConfig>();
        require_sync::<validate::ValidationConfig>();
    }
}
