//! Query Lifecycle
//!
//! The [`Query`] entity and the [`QueryService`] that drives it from
//! creation through execution to a terminal status.
//!
//! ## Architecture
//!
//! ```text
//! caller                        worker
//!   |                             |
//!   | create ──▶ MetaStore        | perform(id)
//!   | enqueue ──▶ transport ──────▶ load ──▶ run
//!   |                             |          | execute ──▶ Cursor
//!   | rows/find (any time)        |          | batches
//!   ▼                             |          ▼
//! MetaStore + ResultStore ◀───────┴── append rows (TTL) + final save
//! ```
//!
//! Life of a query: `created → running → {finished | error}`. The two
//! terminal states accept no further transition; a query executes exactly
//! once, and re-running a statement means creating a new query with a new
//! id. Row data expires `ttl` after the last append; metadata does not
//! expire.

pub mod error;
pub mod id;
pub mod meta;
pub mod results;

pub use error::{QueryError, QueryResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Column, DomainCatalog};
use crate::config::Config;
use crate::engine::{Cursor, Row, SqlEngine};
use crate::store::KvStore;

use id::IdAllocator;
use meta::{MetaRecord, MetaStore};
use results::ResultStore;

/// Format-version tag embedded in every storage key. Bump whenever the
/// persisted record shape changes; old records become invisible instead of
/// being misread.
pub const META_REVISION: u32 = 1;

/// Default cap on rows stored per query.
pub const DEFAULT_QUOTA: u64 = 100_000;

/// Default row-log lifetime after the last append.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Rows requested from the cursor per pull.
pub const CURSOR_BATCH: usize = 1024;

/// Lifecycle states: `created → running → {finished | error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Created,
    Running,
    Finished,
    Error,
}

impl QueryStatus {
    /// Terminal states accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryStatus::Finished | QueryStatus::Error)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryStatus::Created => "created",
            QueryStatus::Running => "running",
            QueryStatus::Finished => "finished",
            QueryStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A submitted statement and everything persisted about it
#[derive(Debug, Clone)]
pub struct Query {
    id: Option<String>,
    statement: String,
    status: QueryStatus,
    quota: u64,
    count: u64,
    schema: Vec<Column>,
    message: String,
    ttl: Duration,
}

impl Query {
    /// New in-memory query with the default quota and TTL. It has no id and
    /// no persisted state until [`QueryService::create`] is called.
    pub fn new(statement: impl Into<String>) -> Self {
        Self::with_limits(statement, DEFAULT_QUOTA, DEFAULT_TTL)
    }

    /// New in-memory query with an explicit row quota and row-log TTL.
    pub fn with_limits(statement: impl Into<String>, quota: u64, ttl: Duration) -> Self {
        Query {
            id: None,
            statement: statement.into(),
            status: QueryStatus::Created,
            quota,
            count: 0,
            schema: Vec::new(),
            message: String::new(),
            ttl,
        }
    }

    pub(crate) fn restore(id: &str, record: MetaRecord, schema: Vec<Column>, ttl: Duration) -> Self {
        Query {
            id: Some(id.to_string()),
            statement: record.statement,
            status: record.status,
            quota: record.quota,
            count: record.count,
            schema,
            message: record.message,
            ttl,
        }
    }

    /// Unique identifier, assigned once by [`QueryService::create`].
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Hard upper bound on rows ever stored for this query.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Rows stored so far; never exceeds `quota`.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Result schema; empty until execution produced one.
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    /// Error text; empty unless `status == error`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Row-log lifetime re-applied on each append. Not persisted: a query
    /// reloaded through `find` carries the service's configured default.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Orchestrates query creation, execution, and reads over the pluggable
/// store, catalog, and engine
pub struct QueryService {
    ids: IdAllocator,
    meta: MetaStore,
    results: ResultStore,
    engine: Arc<dyn SqlEngine>,
    catalog: Arc<dyn DomainCatalog>,
    default_quota: u64,
    default_ttl: Duration,
    cursor_batch: usize,
}

impl QueryService {
    /// Service with the default configuration.
    pub fn new(
        store: Arc<dyn KvStore>,
        catalog: Arc<dyn DomainCatalog>,
        engine: Arc<dyn SqlEngine>,
    ) -> Self {
        Self::with_config(store, catalog, engine, &Config::default())
    }

    /// Service with an explicit configuration (namespace, defaults, batch
    /// size).
    pub fn with_config(
        store: Arc<dyn KvStore>,
        catalog: Arc<dyn DomainCatalog>,
        engine: Arc<dyn SqlEngine>,
        config: &Config,
    ) -> Self {
        let namespace = config.store.namespace.clone();
        QueryService {
            ids: IdAllocator::new(Arc::clone(&store), &namespace),
            meta: MetaStore::new(Arc::clone(&store), namespace.clone()),
            results: ResultStore::new(store, namespace),
            engine,
            catalog,
            default_quota: config.query.default_quota,
            default_ttl: config.query.default_ttl(),
            cursor_batch: config.query.cursor_batch,
        }
    }

    /// Fresh [`Query`] carrying the service's configured default quota and
    /// TTL instead of the crate-level constants.
    pub fn query(&self, statement: impl Into<String>) -> Query {
        Query::with_limits(statement, self.default_quota, self.default_ttl)
    }

    /// Allocates an id and persists the first metadata record. A query
    /// that already carries an id is left untouched, so creation happens
    /// at most once.
    ///
    /// Allocation failures abort before anything is written; a failure to
    /// write the record itself propagates as a store error (a query does
    /// not exist without its metadata).
    pub fn create(&self, query: &mut Query) -> QueryResult<()> {
        if query.id.is_some() {
            return Ok(());
        }
        let id = self.ids.allocate().map_err(QueryError::Allocation)?;
        query.id = Some(id);
        self.save(query)?;
        Ok(())
    }

    /// Persists the current metadata record, overwriting the previous one
    /// whole (last-writer-wins). No-op for queries without an id.
    pub fn save(&self, query: &Query) -> QueryResult<()> {
        self.meta.save(query)?;
        Ok(())
    }

    /// Reloads a query from its metadata record. `Ok(None)` when the
    /// record is missing or its stored schema no longer resolves.
    pub fn find(&self, id: &str) -> QueryResult<Option<Query>> {
        Ok(self.meta.load(id, self.catalog.as_ref(), self.default_ttl)?)
    }

    /// Strict [`find`](Self::find): a missing query is
    /// [`QueryError::NotFound`].
    pub fn get(&self, id: &str) -> QueryResult<Query> {
        self.find(id)?.ok_or_else(|| QueryError::NotFound {
            id: id.to_string(),
        })
    }

    /// Pages stored rows: the inclusive slice `[offset, offset+limit-1]`
    /// in production order. Expired or never-written row logs read as
    /// empty.
    pub fn rows(&self, id: &str, offset: u64, limit: u64) -> QueryResult<Vec<Row>> {
        Ok(self.results.rows(id, offset, limit)?)
    }

    /// Remaining row-log lifetime; `None` once expired or missing.
    pub fn time_left(&self, id: &str) -> QueryResult<Option<Duration>> {
        Ok(self.results.time_left(id)?)
    }

    /// Extends or shortens the row log's lifetime. Returns whether a live
    /// row log existed.
    pub fn expire_after(&self, id: &str, ttl: Duration) -> QueryResult<bool> {
        Ok(self.results.expire_after(id, ttl)?)
    }

    /// Drives a query to a terminal status: executes the statement, streams
    /// rows within quota, and persists the outcome as the last action of
    /// either branch. Execution and fetch failures are captured into
    /// `status = error` with the message recorded; only a failure to
    /// persist that terminal record escapes as an error.
    pub fn run(&self, query: &mut Query) -> QueryResult<()> {
        match self.execute_and_stream(query) {
            Ok(mut cursor) => {
                query.status = QueryStatus::Finished;
                self.save(query)?;
                if cursor.is_open() {
                    if let Err(e) = cursor.close() {
                        // Terminal status is already persisted; a close
                        // failure must not mask it
                        tracing::warn!(
                            id = query.id().unwrap_or_default(),
                            error = %e,
                            "cursor_close_failed"
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    id = query.id().unwrap_or_default(),
                    statement = query.statement(),
                    error = %e,
                    "query_execution_failed"
                );
                query.status = QueryStatus::Error;
                query.message = e.to_string();
                self.save(query)?;
                Ok(())
            }
        }
    }

    /// Worker-side entry point: loads the query by id and runs it.
    ///
    /// Missing ids are skipped silently; no caller-visible state exists to
    /// attach an error to. Queries already past `created` are skipped too,
    /// so a redelivered work item does not execute twice.
    pub fn perform(&self, id: &str) -> QueryResult<()> {
        let Some(mut query) = self.find(id)? else {
            tracing::debug!(id, "query_not_found_skipping");
            return Ok(());
        };
        if query.status != QueryStatus::Created {
            tracing::info!(id, status = %query.status, "query_already_processed_skipping");
            return Ok(());
        }
        tracing::info!(id, statement = query.statement(), "query_job_started");
        self.run(&mut query)
    }

    fn execute_and_stream(&self, query: &mut Query) -> QueryResult<Box<dyn Cursor>> {
        let mut cursor = self.engine.execute(&query.statement)?;
        if cursor.has_more() {
            query.status = QueryStatus::Running;
            query.schema = self.resolve_schema(cursor.schema())?;
            self.save(query)?;
            self.fetch(query, cursor.as_mut())?;
        }
        Ok(cursor)
    }

    fn resolve_schema(&self, raw: Vec<(String, String)>) -> QueryResult<Vec<Column>> {
        let mut schema = Vec::with_capacity(raw.len());
        for (name, token) in raw {
            let domain = match self.catalog.resolve(&token) {
                Some(domain) => domain,
                None => return Err(QueryError::UnresolvedDomain { token }),
            };
            schema.push(Column::new(name, domain));
        }
        Ok(schema)
    }

    /// Quota-bounded batch streaming. Pulls fixed-size batches until the
    /// cursor is exhausted (empty batch) or the quota is reached, truncating
    /// the batch that would cross the quota. Each append is one atomic store
    /// call whose returned length becomes the new `count`; the loop never
    /// retries a failed append.
    fn fetch(&self, query: &mut Query, cursor: &mut dyn Cursor) -> QueryResult<()> {
        loop {
            let batch = cursor.next_batch(self.cursor_batch)?;
            if batch.is_empty() {
                break;
            }
            let room = query.quota.saturating_sub(query.count);
            let take = (batch.len() as u64).min(room) as usize;
            if take > 0 {
                if let Some(id) = query.id.as_deref() {
                    let count = self.results.append(id, &batch[..take], query.ttl)?;
                    query.count = count;
                }
            }
            if query.count >= query.quota {
                break;
            }
        }
        Ok(())
    }
}
