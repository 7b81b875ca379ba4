//! Result Row Log
//!
//! Per-query append-only list of serialized rows, offset-addressable for
//! pagination, expiring `ttl` after the last append. Shares its key prefix
//! (namespace, format revision, id) with the metadata record so the two can
//! never refer to different layouts of the same query.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::Row;
use crate::query::META_REVISION;
use crate::store::{KvStore, StoreResult};

/// Append-only, offset-addressable row log with a sliding expiry
pub struct ResultStore {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl ResultStore {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        ResultStore {
            store,
            namespace: namespace.into(),
        }
    }

    /// Key of the row log.
    pub fn main_key(&self, id: &str) -> String {
        format!("{}:query:{}:{}", self.namespace, META_REVISION, id)
    }

    /// Appends a batch and resets the log's expiry, as one atomic unit.
    /// Returns the log's row count after the append. Callers skip empty
    /// batches; an empty append would still reset the expiry.
    pub fn append(&self, id: &str, rows: &[Row], ttl: Duration) -> StoreResult<u64> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(serde_json::to_string(row)?);
        }
        self.store.append(&self.main_key(id), items, ttl)
    }

    /// Reads rows `[offset, offset+limit-1]` in insertion order. Expired or
    /// never-written logs read as empty, as does a zero `limit`.
    pub fn rows(&self, id: &str, offset: u64, limit: u64) -> StoreResult<Vec<Row>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = offset.saturating_add(limit - 1);
        let items = self.store.range(&self.main_key(id), offset, stop)?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push(serde_json::from_str(&item)?);
        }
        Ok(rows)
    }

    /// Remaining lifetime of the row log; `None` once expired or missing.
    pub fn time_left(&self, id: &str) -> StoreResult<Option<Duration>> {
        self.store.time_left(&self.main_key(id))
    }

    /// Extends or shortens the row log's lifetime independent of appends.
    /// Returns whether a live row log existed.
    pub fn expire_after(&self, id: &str, ttl: Duration) -> StoreResult<bool> {
        self.store.expire(&self.main_key(id), ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::thread::sleep;

    const TTL: Duration = Duration::from_secs(60);

    fn setup() -> (ResultStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let results = ResultStore::new(Arc::clone(&store) as Arc<dyn KvStore>, "test");
        (results, store)
    }

    fn row(n: i64) -> Row {
        vec![json!(n), json!(format!("name_{n}"))]
    }

    #[test]
    fn test_main_key_embeds_revision() {
        let (results, _store) = setup();
        assert_eq!(
            results.main_key("abc_1"),
            format!("test:query:{META_REVISION}:abc_1")
        );
    }

    #[test]
    fn test_append_returns_running_count() {
        let (results, _store) = setup();
        assert_eq!(results.append("q", &[row(1), row(2)], TTL).unwrap(), 2);
        assert_eq!(results.append("q", &[row(3)], TTL).unwrap(), 3);
    }

    #[test]
    fn test_rows_roundtrip_in_order() {
        let (results, _store) = setup();
        results.append("q", &[row(1), row(2)], TTL).unwrap();
        results.append("q", &[row(3)], TTL).unwrap();
        assert_eq!(
            results.rows("q", 0, 10).unwrap(),
            vec![row(1), row(2), row(3)]
        );
    }

    #[test]
    fn test_rows_pages_by_offset_and_limit() {
        let (results, _store) = setup();
        let all: Vec<Row> = (0..5).map(row).collect();
        results.append("q", &all, TTL).unwrap();
        assert_eq!(results.rows("q", 1, 2).unwrap(), vec![row(1), row(2)]);
        assert_eq!(results.rows("q", 4, 2).unwrap(), vec![row(4)]);
    }

    #[test]
    fn test_rows_zero_limit_reads_nothing() {
        let (results, _store) = setup();
        results.append("q", &[row(1)], TTL).unwrap();
        assert!(results.rows("q", 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_rows_missing_log_reads_empty() {
        let (results, _store) = setup();
        assert!(results.rows("nope", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_rows_expired_log_reads_empty() {
        let (results, _store) = setup();
        results
            .append("q", &[row(1)], Duration::from_millis(20))
            .unwrap();
        sleep(Duration::from_millis(50));
        assert!(results.rows("q", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_time_left_tracks_ttl() {
        let (results, _store) = setup();
        assert_eq!(results.time_left("q").unwrap(), None);
        results.append("q", &[row(1)], TTL).unwrap();
        let left = results.time_left("q").unwrap().unwrap();
        assert!(left > Duration::ZERO && left <= TTL);
    }

    #[test]
    fn test_expire_after_overrides_append_ttl() {
        let (results, _store) = setup();
        results.append("q", &[row(1)], TTL).unwrap();
        assert!(results.expire_after("q", Duration::from_millis(20)).unwrap());
        sleep(Duration::from_millis(50));
        assert!(results.rows("q", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_expire_after_missing_log_returns_false() {
        let (results, _store) = setup();
        assert!(!results.expire_after("nope", TTL).unwrap());
    }

    #[test]
    fn test_rows_are_stored_as_json_texts() {
        let (results, store) = setup();
        results.append("q", &[row(7)], TTL).unwrap();
        let raw = store.range(&results.main_key("q"), 0, 0).unwrap();
        assert_eq!(raw, vec!["[7,\"name_7\"]".to_string()]);
    }
}
