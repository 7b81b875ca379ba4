//! Query Metadata Persistence
//!
//! One JSON record per query holds everything durable about it except the
//! rows themselves. Records live forever (no TTL); the row log expires
//! independently. Both keys embed the same format revision so a record
//! written under an old shape is invisible to code expecting a new one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Column, DomainCatalog};
use crate::query::{Query, QueryStatus, META_REVISION};
use crate::store::{KvStore, StoreResult};

/// Persisted metadata record, exactly the wire shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetaRecord {
    pub status: QueryStatus,
    pub statement: String,
    pub count: u64,
    pub quota: u64,
    /// `[column name, domain name]` pairs in result order
    pub schema: Vec<(String, String)>,
    pub message: String,
}

/// Durable key-value record of a query's metadata
pub struct MetaStore {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl MetaStore {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        MetaStore {
            store,
            namespace: namespace.into(),
        }
    }

    /// Key of the metadata record. The revision tag isolates incompatible
    /// record formats under distinct keys.
    pub fn meta_key(&self, id: &str) -> String {
        format!("{}:query:{}:{}:meta", self.namespace, META_REVISION, id)
    }

    /// Overwrites the whole metadata record, last-writer-wins. A query
    /// without an id has no key and saves nothing.
    pub fn save(&self, query: &Query) -> StoreResult<()> {
        let Some(id) = query.id() else {
            return Ok(());
        };
        let record = MetaRecord {
            status: query.status(),
            statement: query.statement().to_string(),
            count: query.count(),
            quota: query.quota(),
            schema: query
                .schema()
                .iter()
                .map(|c| (c.name.clone(), c.domain.name.clone()))
                .collect(),
            message: query.message().to_string(),
        };
        let json = serde_json::to_string(&record)?;
        self.store.set(&self.meta_key(id), &json)
    }

    /// Loads a query by id. Missing records read as `None`; so do records
    /// whose stored domains the catalog no longer resolves. A stale schema
    /// is treated as a disappeared query, not a hard fault.
    pub fn load(
        &self,
        id: &str,
        catalog: &dyn DomainCatalog,
        ttl: Duration,
    ) -> StoreResult<Option<Query>> {
        let Some(json) = self.store.get(&self.meta_key(id))? else {
            return Ok(None);
        };
        let record: MetaRecord = serde_json::from_str(&json)?;

        let mut schema = Vec::with_capacity(record.schema.len());
        for (name, domain_name) in &record.schema {
            match catalog.resolve(domain_name) {
                Some(domain) => schema.push(Column::new(name.clone(), domain)),
                None => return Ok(None),
            }
        }

        Ok(Some(Query::restore(id, record, schema, ttl)))
    }
}
