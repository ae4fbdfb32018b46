//! Property tests for validator invariants.
//!
//! Uses proptest to verify:
//! 1. Outlier annotation alignment — flags are always index-aligned
//! 2. Gap monotonicity — removing observations never raises completeness
//! 3. Score bounds — every score lands in [0, 100]
//! 4. Determinism — the same batch always scores the same

use proptest::prelude::*;

use chrono::NaiveDate;
use enerflux_core::domain::PriceRecord;
use enerflux_core::validate::{
    check_completeness, detect_outliers, generate_quality_report, validate_schema,
    OutlierMethod, ValidationConfig,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..300.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_batch() -> impl Strategy<Value = Vec<PriceRecord>> {
    prop::collection::vec(arb_price(), 0..60).prop_map(|prices| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| {
                PriceRecord::new(
                    base + chrono::Duration::days(i as i64),
                    "WTI_CRUDE",
                    "EIA",
                    price,
                )
            })
            .collect()
    })
}

const METHODS: [OutlierMethod; 2] = [OutlierMethod::ZScore, OutlierMethod::Iqr];

// ── 1. Annotation alignment ──────────────────────────────────────────

proptest! {
    #[test]
    fn outlier_flags_align_with_batch(batch in arb_batch()) {
        let config = ValidationConfig::default();
        let flags = detect_outliers(&batch, &METHODS, &config.outliers);
        prop_assert_eq!(flags.len(), batch.len());
        prop_assert_eq!(flags.zscore.len(), batch.len());
        prop_assert_eq!(flags.iqr.len(), batch.len());

        let rate = flags.outlier_rate();
        prop_assert!((0.0..=1.0).contains(&rate));
    }
}

// ── 2. Gap monotonicity ──────────────────────────────────────────────

proptest! {
    /// Dropping observations from a batch can only lower (or keep) the
    /// completeness score, provided the span endpoints survive.
    #[test]
    fn removing_interior_points_never_raises_completeness(
        batch in arb_batch().prop_filter("need 3+ points", |b| b.len() >= 3),
        remove_idx in 1usize..58,
    ) {
        prop_assume!(remove_idx < batch.len() - 1);

        let config = ValidationConfig::default();
        let full = check_completeness(&batch, true, &config.completeness);

        let mut thinned = batch.clone();
        thinned.remove(remove_idx);
        let partial = check_completeness(&thinned, true, &config.completeness);

        prop_assert!(partial.completeness_score <= full.completeness_score);
    }
}

// ── 3. Score bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn all_scores_stay_in_bounds(batch in arb_batch()) {
        let config = ValidationConfig::default();
        let schema = validate_schema(&batch, &config);
        let completeness = check_completeness(&batch, true, &config.completeness);
        let outliers = detect_outliers(&batch, &METHODS, &config.outliers);
        let report = generate_quality_report(
            "EIA", &batch, &schema, &completeness, None, &outliers, &config,
        );

        prop_assert!((0.0..=100.0).contains(&schema.schema_compliance_score));
        prop_assert!((0.0..=100.0).contains(&report.overall_quality_score));
        prop_assert!((0.0..=100.0).contains(&report.scores.outlier));
    }
}

// ── 4. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn validation_is_deterministic(batch in arb_batch()) {
        let config = ValidationConfig::default();

        let schema_a = validate_schema(&batch, &config);
        let schema_b = validate_schema(&batch, &config);
        prop_assert_eq!(schema_a.schema_compliance_score, schema_b.schema_compliance_score);
        prop_assert_eq!(schema_a.errors, schema_b.errors);

        let flags_a = detect_outliers(&batch, &METHODS, &config.outliers);
        let flags_b = detect_outliers(&batch, &METHODS, &config.outliers);
        prop_assert_eq!(flags_a.any, flags_b.any);

        let comp_a = check_completeness(&batch, true, &config.completeness);
        let comp_b = check_completeness(&batch, true, &config.completeness);
        prop_assert_eq!(comp_a.completeness_score, comp_b.completeness_score);
        prop_assert_eq!(comp_a.gap_count, comp_b.gap_count);
    }
}
