//! Criterion benchmarks for validator hot paths.
//!
//! Benchmarks:
//! 1. Rolling z-score + IQR outlier detection over long daily series
//! 2. Completeness check (expected-count walk + gap enumeration)
//! 3. Full quality report assembly

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::NaiveDate;
use enerflux_core::domain::PriceRecord;
use enerflux_core::validate::{
    check_completeness, detect_outliers, generate_quality_report, validate_schema,
    OutlierMethod, ValidationConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_batch(n: usize) -> Vec<PriceRecord> {
    let mut rng = StdRng::seed_from_u64(7);
    let base = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let mut price = 75.0_f64;

    (0..n)
        .map(|i| {
            price *= 1.0 + rng.gen_range(-0.02..0.02);
            PriceRecord::new(
                base + chrono::Duration::days(i as i64),
                "WTI_CRUDE",
                "EIA",
                price.max(1.0),
            )
        })
        .collect()
}

const METHODS: [OutlierMethod; 2] = [OutlierMethod::ZScore, OutlierMethod::Iqr];

fn bench_outlier_detection(c: &mut Criterion) {
    let config = ValidationConfig::default();
    let mut group = c.benchmark_group("outlier_detection");

    for n in [250usize, 1_000, 5_000] {
        let batch = make_batch(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &batch, |b, batch| {
            b.iter(|| detect_outliers(black_box(batch), &METHODS, &config.outliers));
        });
    }
    group.finish();
}

fn bench_completeness(c: &mut Criterion) {
    let config = ValidationConfig::default();
    let batch = make_batch(5_000);

    c.bench_function("completeness_5k", |b| {
        b.iter(|| check_completeness(black_box(&batch), true, &config.completeness));
    });
}

fn bench_quality_report(c: &mut Criterion) {
    let config = ValidationConfig::default();
    let batch = make_batch(1_000);

    c.bench_function("quality_report_1k", |b| {
        b.iter(|| {
            let schema = validate_schema(&batch, &config);
            let completeness = check_completeness(&batch, true, &config.completeness);
            let outliers = detect_outliers(&batch, &METHODS, &config.outliers);
            generate_quality_report(
                "EIA",
                black_box(&batch),
                &schema,
                &completeness,
                None,
                &outliers,
                &config,
            )
        });
    });
}

criterion_group!(
    benches,
    bench_outlier_detection,
    bench_completeness,
    bench_quality_report
);
criterion_main!(benches);
