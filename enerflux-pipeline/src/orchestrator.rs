//! Pipeline orchestrator: one end-to-end run.
//!
//! Computes the fetch window, fans out to the enabled adapters on a private
//! worker pool, routes each source's batch through the validator, applies the
//! quality gate, and upserts what passes. Sources are independent: one
//! failure never cancels the others, and per-source aggregation is
//! commutative.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;

use enerflux_core::domain::{sort_batch, PriceRecord};
use enerflux_core::sources::{eia, fred, quote, CacheConfig, RetryPolicy};
use enerflux_core::sources::{EiaAdapter, FredAdapter, QuoteAdapter, SourceAdapter, SourceError};
use enerflux_core::validate::{
    check_completeness, detect_outliers, generate_quality_report, validate_cross_source,
    validate_schema, OutlierMethod,
};

use crate::config::{PipelineConfig, RunMode};
use crate::result::ExecutionResult;
use crate::store::SqliteStore;

/// One provider-native series and the canonical symbol it lands under.
#[derive(Debug, Clone)]
pub struct SeriesMapping {
    pub native_id: String,
    pub commodity: String,
}

/// An enabled source: its adapter plus the series it contributes.
pub struct SourceSpec {
    pub name: String,
    pub adapter: Box<dyn SourceAdapter>,
    pub series: Vec<SeriesMapping>,
}

/// Per-run options. Everything unset falls back to the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Canonical-symbol subset; `None` means all configured.
    pub commodities: Option<Vec<String>>,
    /// Source-name subset; `None` means all enabled.
    pub sources: Option<Vec<String>>,
    pub mode: Option<RunMode>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub quality_threshold: Option<f64>,
    pub exclude_weekends: Option<bool>,
    /// Keep processing remaining sources after one fails.
    pub continue_on_partial_failure: Option<bool>,
    pub max_parallel_fetches: Option<usize>,
    /// Cooperative deadline: tasks not yet started when it expires are
    /// skipped, and a source mid-retry stops retrying; in-flight requests
    /// run to their own HTTP timeouts.
    pub deadline: Option<Instant>,
}

const OUTLIER_METHODS: [OutlierMethod; 2] = [OutlierMethod::ZScore, OutlierMethod::Iqr];

/// Drives fetch → validate → gate → store across all enabled sources.
pub struct Orchestrator {
    config: PipelineConfig,
    store: SqliteStore,
    sources: Vec<SourceSpec>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, store: SqliteStore, sources: Vec<SourceSpec>) -> Self {
        Self {
            config,
            store,
            sources,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Execute one pipeline run.
    pub fn run(&self, options: &RunOptions) -> ExecutionResult {
        let mut result = ExecutionResult::new();
        let mode = options.mode.unwrap_or(self.config.date_range.mode);
        tracing::info!(%mode, "starting pipeline run");

        let window = match self.compute_window(options, mode, &mut result) {
            Ok(window) => window,
            Err(message) => {
                result.errors.push(message);
                result.finalize();
                return result;
            }
        };
        tracing::info!(start = %window.0, end = %window.1, "fetch window computed");

        let specs = self.active_sources(options);
        if specs.is_empty() {
            result
                .warnings
                .push("no enabled sources matched the requested subset".to_string());
            result.finalize();
            return result;
        }

        let fetches = match self.fetch_all(&specs, window, options) {
            Ok(fetches) => fetches,
            Err(message) => {
                result.errors.push(message);
                result.finalize();
                return result;
            }
        };

        self.process_fetches(fetches, options, &mut result);

        result.finalize();
        tracing::info!(status = %result.status, "pipeline run finished");
        result
    }

    /// Resolve the fetch window from options, mode, and stored coverage.
    fn compute_window(
        &self,
        options: &RunOptions,
        mode: RunMode,
        result: &mut ExecutionResult,
    ) -> Result<(NaiveDate, NaiveDate), String> {
        let today = Utc::now().date_naive();
        let lookback = Duration::days(self.config.date_range.lookback_days);

        let start = match options.start {
            Some(start) => start,
            None => match mode {
                RunMode::Incremental => match self.store.latest_timestamp() {
                    Ok(Some(latest)) => latest.date_naive() + Duration::days(1),
                    Ok(None) => {
                        result.warnings.push(
                            "storage is empty; falling back to the lookback window".to_string(),
                        );
                        today - lookback
                    }
                    Err(err) => {
                        result.warnings.push(format!(
                            "could not read latest stored timestamp ({err}); using lookback window"
                        ));
                        today - lookback
                    }
                },
                RunMode::FullRefresh | RunMode::Backfill => today - lookback,
            },
        };

        let requested_end = options.end.unwrap_or(today);
        let end = if requested_end > today {
            result.warnings.push(format!(
                "End date {requested_end} is in the future; clamped to {today}"
            ));
            today
        } else {
            requested_end
        };

        if start > end {
            return Err(format!(
                "invalid fetch window: start {start} is after end {end}"
            ));
        }
        Ok((start, end))
    }

    /// Enabled sources restricted to the requested source and commodity
    /// subsets. A source whose series all fall outside the commodity subset
    /// is skipped entirely.
    fn active_sources(&self, options: &RunOptions) -> Vec<&SourceSpec> {
        self.sources
            .iter()
            .filter(|spec| match &options.sources {
                Some(wanted) => wanted
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&spec.name)),
                None => true,
            })
            .filter(|spec| match &options.commodities {
                Some(wanted) => spec
                    .series
                    .iter()
                    .any(|m| wanted.iter().any(|c| c.eq_ignore_ascii_case(&m.commodity))),
                None => true,
            })
            .collect()
    }

    /// Fan the fetches out on a private pool capped at `max_parallel_fetches`.
    #[allow(clippy::type_complexity)]
    fn fetch_all(
        &self,
        specs: &[&SourceSpec],
        window: (NaiveDate, NaiveDate),
        options: &RunOptions,
    ) -> Result<Vec<(String, Result<Vec<PriceRecord>, SourceError>)>, String> {
        let parallelism = options
            .max_parallel_fetches
            .unwrap_or(specs.len())
            .clamp(1, specs.len().max(1));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|e| format!("failed to build fetch worker pool: {e}"))?;

        Ok(pool.install(|| {
            specs
                .par_iter()
                .map(|spec| {
                    (
                        spec.name.clone(),
                        fetch_source(spec, window, options),
                    )
                })
                .collect()
        }))
    }

    /// Validate, gate, and store each fetched batch; fill the result maps.
    fn process_fetches(
        &self,
        fetches: Vec<(String, Result<Vec<PriceRecord>, SourceError>)>,
        options: &RunOptions,
        result: &mut ExecutionResult,
    ) {
        let threshold = options
            .quality_threshold
            .unwrap_or(self.config.validation.quality_threshold);
        let exclude_weekends = options
            .exclude_weekends
            .unwrap_or(self.config.validation.exclude_weekends);
        let continue_on_failure = options
            .continue_on_partial_failure
            .unwrap_or(self.config.error_handling.continue_on_partial_failure);

        let mut batches: BTreeMap<String, Vec<PriceRecord>> = BTreeMap::new();
        let mut aborted = false;

        for (name, fetch) in fetches {
            if aborted {
                result.records_fetched.entry(name.clone()).or_insert(0);
                result.records_stored.insert(name.clone(), 0);
                result
                    .warnings
                    .push(format!("{name}: skipped after earlier source failure"));
                continue;
            }

            match fetch {
                Ok(records) => {
                    result.records_fetched.insert(name.clone(), records.len());
                    if records.is_empty() {
                        result
                            .warnings
                            .push(format!("{name}: no data returned for the window"));
                        result.records_stored.insert(name, 0);
                    } else {
                        batches.insert(name, records);
                    }
                }
                Err(err) => {
                    tracing::error!(source = %name, %err, "source fetch failed");
                    result.records_fetched.insert(name.clone(), 0);
                    result.records_stored.insert(name.clone(), 0);
                    result.errors.push(format!("{name}: {err}"));
                    if !continue_on_failure {
                        aborted = true;
                    }
                }
            }
        }

        let consistency = self.cross_source_scores(&batches, result);

        for (name, batch) in &batches {
            let schema = validate_schema(batch, &self.config.validation);
            let completeness =
                check_completeness(batch, exclude_weekends, &self.config.validation.completeness);
            let outliers = detect_outliers(batch, &OUTLIER_METHODS, &self.config.validation.outliers);

            let report = generate_quality_report(
                name,
                batch,
                &schema,
                &completeness,
                consistency.get(name).copied(),
                &outliers,
                &self.config.validation,
            );
            tracing::debug!(source = %name, report = %report.render_text(), "quality report");
            result
                .quality_scores
                .insert(name.clone(), report.overall_quality_score);

            // Inclusive gate: a score exactly at the threshold passes.
            if report.overall_quality_score < threshold {
                tracing::warn!(
                    source = %name,
                    score = report.overall_quality_score,
                    threshold,
                    "batch dropped by quality gate"
                );
                result.warnings.push(format!(
                    "{name}: quality score {}% below threshold {}%; batch dropped",
                    report.overall_quality_score, threshold
                ));
                result.records_stored.insert(name.clone(), 0);
                continue;
            }

            match self.store.upsert_batch(batch) {
                Ok(stored) => {
                    tracing::info!(source = %name, stored, "batch stored");
                    result.records_stored.insert(name.clone(), stored);
                }
                Err(err) => {
                    tracing::error!(source = %name, %err, "storage failed");
                    result.errors.push(format!("{name}: storage failed: {err}"));
                    result.records_stored.insert(name.clone(), 0);
                }
            }
        }
    }

    /// Pairwise cross-source comparison per commodity. Each source's score is
    /// the minimum over the pairs it overlaps with; sources with no
    /// overlapping peer keep the neutral default.
    fn cross_source_scores(
        &self,
        batches: &BTreeMap<String, Vec<PriceRecord>>,
        result: &mut ExecutionResult,
    ) -> BTreeMap<String, f64> {
        let tolerance = self.config.validation.tolerances.cross_source_tolerance;

        // commodity → [(source, records)] with per-commodity slices.
        let mut by_commodity: BTreeMap<String, Vec<(String, Vec<PriceRecord>)>> = BTreeMap::new();
        for (source, batch) in batches {
            let mut per_commodity: BTreeMap<String, Vec<PriceRecord>> = BTreeMap::new();
            for record in batch {
                per_commodity
                    .entry(record.commodity.clone())
                    .or_default()
                    .push(record.clone());
            }
            for (commodity, records) in per_commodity {
                by_commodity
                    .entry(commodity)
                    .or_default()
                    .push((source.clone(), records));
            }
        }

        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        for (commodity, entries) in &by_commodity {
            for i in 0..entries.len() {
                for j in (i + 1)..entries.len() {
                    let (source_a, batch_a) = &entries[i];
                    let (source_b, batch_b) = &entries[j];
                    let report = validate_cross_source(batch_a, batch_b, tolerance);
                    if report.common_timestamps == 0 {
                        continue;
                    }
                    if report.total_discrepancies > 0 {
                        tracing::warn!(
                            commodity = %commodity,
                            source_a = %source_a,
                            source_b = %source_b,
                            discrepancies = report.total_discrepancies,
                            score = report.consistency_score,
                            "cross-source discrepancies"
                        );
                        result.warnings.push(format!(
                            "{commodity}: {} discrepancies between {source_a} and {source_b} \
                             (consistency {}%)",
                            report.total_discrepancies, report.consistency_score
                        ));
                    }
                    for source in [source_a, source_b] {
                        scores
                            .entry(source.clone())
                            .and_modify(|s| *s = s.min(report.consistency_score))
                            .or_insert(report.consistency_score);
                    }
                }
            }
        }
        scores
    }
}

/// Fetch every series of one source and map it onto canonical records.
///
/// The first failing series fails the whole source.
fn fetch_source(
    spec: &SourceSpec,
    window: (NaiveDate, NaiveDate),
    options: &RunOptions,
) -> Result<Vec<PriceRecord>, SourceError> {
    if let Some(deadline) = options.deadline {
        if Instant::now() >= deadline {
            tracing::warn!(source = %spec.name, "deadline expired; fetch not started");
            return Err(SourceError::Transient(
                "pipeline deadline expired before fetch started".into(),
            ));
        }
    }

    let wanted = options.commodities.as_ref();
    let mut records = Vec::new();

    for mapping in &spec.series {
        if let Some(wanted) = wanted {
            if !wanted
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&mapping.commodity))
            {
                continue;
            }
        }

        let points = spec
            .adapter
            .fetch_series(&mapping.native_id, window.0, window.1, options.deadline)?;
        records.extend(
            points
                .into_iter()
                .map(|p| p.into_record(&mapping.commodity, &spec.name)),
        );
    }

    sort_batch(&mut records);
    Ok(records)
}

/// Build the concrete adapters for every enabled provider.
///
/// Initialization failures (typically a missing credential) disable that
/// source and come back as warnings; the remaining sources still run.
pub fn build_sources(config: &PipelineConfig) -> (Vec<SourceSpec>, Vec<String>) {
    let mut specs = Vec::new();
    let mut warnings = Vec::new();
    let retry = RetryPolicy::with_attempts(config.error_handling.retry_attempts);

    if config.data_sources.eia.enabled {
        match EiaAdapter::new(None, CacheConfig::from_env()) {
            Ok(adapter) => {
                let adapter = adapter.with_retry_policy(retry);
                let series = config
                    .data_sources
                    .eia
                    .commodities
                    .iter()
                    .filter_map(|commodity| {
                        match eia::SERIES_MAP.iter().find(|(_, c)| *c == commodity.as_str()) {
                            Some((native, canonical)) => Some(SeriesMapping {
                                native_id: native.to_string(),
                                commodity: canonical.to_string(),
                            }),
                            None => {
                                warnings.push(format!(
                                    "EIA: no series mapping for commodity '{commodity}'"
                                ));
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>();
                specs.push(SourceSpec {
                    name: "EIA".to_string(),
                    adapter: Box::new(adapter),
                    series,
                });
            }
            Err(err) => warnings.push(format!("EIA adapter disabled: {err}")),
        }
    }

    if config.data_sources.fred.enabled {
        match FredAdapter::new(None, CacheConfig::from_env()) {
            Ok(adapter) => {
                let adapter = adapter.with_retry_policy(retry);
                let series = config
                    .data_sources
                    .fred
                    .series
                    .iter()
                    .filter_map(|series_id| {
                        match fred::SERIES_MAP.iter().find(|(id, _)| *id == series_id.as_str()) {
                            Some((native, canonical)) => Some(SeriesMapping {
                                native_id: native.to_string(),
                                commodity: canonical.to_string(),
                            }),
                            None => {
                                warnings.push(format!(
                                    "FRED: no commodity mapping for series '{series_id}'"
                                ));
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>();
                specs.push(SourceSpec {
                    name: "FRED".to_string(),
                    adapter: Box::new(adapter),
                    series,
                });
            }
            Err(err) => warnings.push(format!("FRED adapter disabled: {err}")),
        }
    }

    if config.data_sources.quotes.enabled {
        match QuoteAdapter::new(CacheConfig::from_env()) {
            Ok(adapter) => {
                let adapter = adapter.with_retry_policy(retry);
                let series = config
                    .data_sources
                    .quotes
                    .tickers
                    .iter()
                    .filter_map(|ticker| {
                        match quote::TICKER_MAP.iter().find(|(t, _)| *t == ticker.as_str()) {
                            Some((native, canonical)) => Some(SeriesMapping {
                                native_id: native.to_string(),
                                commodity: canonical.to_string(),
                            }),
                            None => {
                                warnings.push(format!(
                                    "QUOTES: no commodity mapping for ticker '{ticker}'"
                                ));
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>();
                specs.push(SourceSpec {
                    name: "QUOTES".to_string(),
                    adapter: Box::new(adapter),
                    series,
                });
            }
            Err(err) => warnings.push(format!("QUOTES adapter disabled: {err}")),
        }
    }

    (specs, warnings)
}
