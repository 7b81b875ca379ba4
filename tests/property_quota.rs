//! Property-based quota and pagination tests (proptest).

use proptest::prelude::*;
use serde_json::json;
use sqlstash::{
    CannedResult, MemoryCatalog, MemoryEngine, MemoryStore, Query, QueryService, QueryStatus, Row,
};
use std::sync::Arc;
use std::time::Duration;

/// Helper to run one canned query: `total` rows delivered in batches of
/// `batch`, stored under `quota`.
fn run_canned(total: usize, batch: usize, quota: u64) -> (Query, QueryService) {
    let rows: Vec<Row> = (0..total as u64).map(|i| vec![json!(i)]).collect();
    let mut engine = MemoryEngine::new();
    engine.register(
        "SELECT n FROM t",
        CannedResult {
            schema: vec![("n".to_string(), "int".to_string())],
            rows,
            batch_size: Some(batch),
            ..CannedResult::default()
        },
    );
    let service = QueryService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryCatalog::with_domains(["int"])),
        Arc::new(engine),
    );

    let mut query = Query::with_limits("SELECT n FROM t", quota, Duration::from_secs(60));
    service.create(&mut query).unwrap();
    service.run(&mut query).unwrap();
    (query, service)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Stored count is min(total, quota) regardless of batching
    #[test]
    fn prop_count_is_min_of_total_and_quota(
        total in 0usize..200,
        batch in 1usize..50,
        quota in 0u64..150,
    ) {
        let (query, _service) = run_canned(total, batch, quota);
        prop_assert_eq!(query.status(), QueryStatus::Finished);
        prop_assert_eq!(query.count(), (total as u64).min(quota));
    }

    /// Stored rows are the exact prefix of the produced rows, in order
    #[test]
    fn prop_stored_rows_are_ordered_prefix(
        total in 0usize..200,
        batch in 1usize..50,
        quota in 0u64..150,
    ) {
        let (query, service) = run_canned(total, batch, quota);
        let id = query.id().unwrap();
        let stored = service.rows(id, 0, 500).unwrap();
        let expected: Vec<Row> = (0..(total as u64).min(quota)).map(|i| vec![json!(i)]).collect();
        prop_assert_eq!(stored, expected);
    }

    /// Pagination never reads past the stored prefix
    #[test]
    fn prop_pagination_is_bounded(
        total in 1usize..100,
        offset in 0u64..120,
        limit in 0u64..60,
    ) {
        let (query, service) = run_canned(total, 7, 50);
        let id = query.id().unwrap();
        let stored = query.count();

        let page = service.rows(id, offset, limit).unwrap();
        let expected_len = if offset >= stored || limit == 0 {
            0
        } else {
            (stored - offset).min(limit) as usize
        };
        prop_assert_eq!(page.len(), expected_len);
    }

    /// A reloaded query's count always matches what the row log holds
    #[test]
    fn prop_reloaded_count_matches_row_log(
        total in 0usize..120,
        batch in 1usize..40,
    ) {
        let (query, service) = run_canned(total, batch, 80);
        let id = query.id().unwrap();
        let found = service.get(id).unwrap();
        let held = service.rows(id, 0, 10_000).unwrap().len();
        prop_assert_eq!(found.count() as usize, held);
    }
}
