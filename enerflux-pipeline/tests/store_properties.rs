//! Property tests for storage invariants.
//!
//! Uses proptest to verify:
//! 1. Upsert idempotence — replaying a batch leaves identical rows and
//!    reports the full batch size
//! 2. Natural-key uniqueness — no `(timestamp, commodity, source)` ever
//!    appears twice, whatever order batches arrive in

use proptest::prelude::*;

use chrono::NaiveDate;
use enerflux_core::domain::PriceRecord;
use enerflux_pipeline::config::StorageConfig;
use enerflux_pipeline::store::SqliteStore;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..300.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Batches over a small key space so natural-key collisions actually happen.
fn arb_batch() -> impl Strategy<Value = Vec<PriceRecord>> {
    prop::collection::vec(
        (0i64..20, 0usize..2, 0usize..2, arb_price()),
        1..40,
    )
    .prop_map(|rows| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let commodities = ["WTI_CRUDE", "BRENT_CRUDE"];
        let sources = ["EIA", "FRED"];
        rows.into_iter()
            .map(|(day, c, s, price)| {
                PriceRecord::new(
                    base + chrono::Duration::days(day),
                    commodities[c],
                    sources[s],
                    price,
                )
            })
            .collect()
    })
}

fn dedup_by_key(batch: &[PriceRecord]) -> Vec<PriceRecord> {
    // Last write wins within a batch, matching upsert order.
    let mut map = std::collections::BTreeMap::new();
    for record in batch {
        map.insert(
            (record.timestamp, record.commodity.clone(), record.source.clone()),
            record.clone(),
        );
    }
    map.into_values().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn upsert_replay_is_idempotent(batch in arb_batch()) {
        let store = SqliteStore::open_in_memory(StorageConfig::default()).unwrap();

        store.upsert_batch(&batch).unwrap();
        let after_first: Vec<_> = ["EIA", "FRED"]
            .iter()
            .flat_map(|s| {
                store.get_range("WTI_CRUDE", s, None, None, None).unwrap().into_iter().chain(
                    store.get_range("BRENT_CRUDE", s, None, None, None).unwrap(),
                )
            })
            .collect();

        let affected = store.upsert_batch(&batch).unwrap();
        prop_assert_eq!(affected, batch.len());

        let after_second: Vec<_> = ["EIA", "FRED"]
            .iter()
            .flat_map(|s| {
                store.get_range("WTI_CRUDE", s, None, None, None).unwrap().into_iter().chain(
                    store.get_range("BRENT_CRUDE", s, None, None, None).unwrap(),
                )
            })
            .collect();

        prop_assert_eq!(after_first, after_second);
    }

    #[test]
    fn natural_key_is_unique_after_any_batch_sequence(
        first in arb_batch(),
        second in arb_batch(),
    ) {
        let store = SqliteStore::open_in_memory(StorageConfig::default()).unwrap();
        store.upsert_batch(&first).unwrap();
        store.upsert_batch(&second).unwrap();

        let mut combined: Vec<PriceRecord> = first;
        combined.extend(second);
        let expected_rows = dedup_by_key(&combined).len();

        let mut stored = 0usize;
        for commodity in ["WTI_CRUDE", "BRENT_CRUDE"] {
            for source in ["EIA", "FRED"] {
                let rows = store.get_range(commodity, source, None, None, None).unwrap();
                // Ascending and strictly unique per pair.
                prop_assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                stored += rows.len();
            }
        }
        prop_assert_eq!(stored, expected_rows);
    }
}
