//! # SqlStash Query Cache
//!
//! Asynchronous SQL query execution with cached, pageable results. A
//! caller submits a statement and immediately gets back a query id; a
//! background worker executes the statement, streams rows into a
//! key-value store under a row quota, and records a terminal status.
//! Results are then paged out of the store for as long as their TTL
//! keeps them alive.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! submit(statement)
//!     ↓
//! [QueryService::create]  → id allocation + metadata record
//!     ↓
//! [JobQueue::enqueue]     → id crosses the transport
//!     ↓
//! [JobRunner worker]      → perform(id)
//!     ↓
//! [SqlEngine::execute]    → Cursor
//!     ↓
//! [fetch loop]            → quota-bounded batches → ResultStore (TTL)
//!     ↓
//! [final save]            → status: finished | error
//! ```
//!
//! Every seam is a trait: [`KvStore`] for storage, [`SqlEngine`] for
//! execution, [`DomainCatalog`] for column typing, [`JobQueue`] for the
//! job transport. The bundled in-memory implementations make the crate
//! self-contained for embedding and tests; production deployments swap
//! in their own.
//!
//! ## Usage
//!
//! ### Submit and poll
//! ```rust
//! use sqlstash::{Domain, JobRunner, MemoryCatalog, MemoryEngine, MemoryStore};
//! use sqlstash::{QueryService, QueryStatus};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), sqlstash::QueryError> {
//! let mut engine = MemoryEngine::new();
//! engine.register_rows(
//!     "SELECT id FROM users",
//!     vec![("id".to_string(), "int".to_string())],
//!     vec![vec![serde_json::json!(1)], vec![serde_json::json!(2)]],
//! );
//!
//! let mut catalog = MemoryCatalog::new();
//! catalog.register(Domain::new("int"));
//!
//! let service = Arc::new(QueryService::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(catalog),
//!     Arc::new(engine),
//! ));
//!
//! let runner = JobRunner::start(Arc::clone(&service), 1)?;
//! let query = runner.submit("SELECT id FROM users")?;
//! let id = query.id().unwrap().to_string();
//! runner.shutdown()?; // drains queued work before returning
//!
//! let done = service.get(&id)?;
//! assert_eq!(done.status(), QueryStatus::Finished);
//! assert_eq!(service.rows(&id, 0, 10)?.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ### Configured deployment
//! ```rust,ignore
//! use sqlstash::{Config, JobRunner, QueryService};
//!
//! let config = Config::load()?;
//! let service = Arc::new(QueryService::with_config(store, catalog, engine, &config));
//! let runner = JobRunner::start(service, config.worker.threads)?;
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `store` | Key-value store seam + in-memory implementation |
//! | `catalog` | Column domain resolution |
//! | `engine` | SQL execution seam + canned in-memory engine |
//! | `query` | Query entity, lifecycle, and the orchestrating service |
//! | `worker` | Job transport seam + in-process worker pool |
//! | `config` | Hierarchical configuration (files + environment) |

// Pluggable seams and their bundled in-memory implementations
pub mod catalog;
pub mod engine;
pub mod store;

// Query lifecycle and orchestration
pub mod query;

// Background execution
pub mod worker;

// Configuration system
pub mod config;

// Re-export the core query types
pub use query::{
    Query, QueryError, QueryResult, QueryService, QueryStatus, CURSOR_BATCH, DEFAULT_QUOTA,
    DEFAULT_TTL, META_REVISION,
};

// Re-export the seam traits and in-memory implementations
pub use catalog::{Column, Domain, DomainCatalog, MemoryCatalog};
pub use engine::{CannedResult, Cursor, EngineError, MemoryEngine, Row, SqlEngine};
pub use store::{KvStore, MemoryStore, StoreError, StoreResult};

// Re-export configuration and background execution
pub use config::Config;
pub use worker::{JobQueue, JobRunner, QueueError};
