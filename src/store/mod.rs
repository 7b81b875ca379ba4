//! Key-Value Store Abstraction
//!
//! Every durable effect of the query subsystem goes through the [`KvStore`]
//! trait: the id sequence counter, metadata records, and the per-query row
//! logs. Keys are derived deterministically from
//! `(namespace, format revision, query id)` by the callers; the store itself
//! is a plain string-keyed surface with list and expiry support.
//!
//! [`MemoryStore`] is the bundled backend. Deployments with an external
//! key-value service implement the trait over their own client instead.

pub mod memory;

pub use memory::MemoryStore;

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The key exists but holds an incompatible kind of value
    #[error("wrong value kind: {0}")]
    WrongKind(String),

    /// Snapshot file could not be interpreted
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The store is unreachable or rejected the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value surface the query subsystem persists through
///
/// Implementations must make every operation atomic with respect to the
/// others; callers never take out-of-band locks.
pub trait KvStore: Send + Sync {
    /// Atomically increments the integer stored at `key` and returns the new
    /// value. A missing key counts up from zero. A value that is not an
    /// integer is a [`StoreError::WrongKind`].
    fn incr(&self, key: &str) -> StoreResult<u64>;

    /// Overwrites the value at `key` with a string, as a whole-record
    /// atomic write, clearing any expiry.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Reads the string value at `key`; `None` when absent or expired.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Appends `items` to the tail of the list at `key` and resets the
    /// list's expiry to `ttl` from now, both effects as one atomic unit,
    /// so a freshly written list is never left without a fresh expiry.
    /// Returns the list length after the append.
    fn append(&self, key: &str, items: Vec<String>, ttl: Duration) -> StoreResult<u64>;

    /// Reads the inclusive `[start, stop]` slice of the list at `key`, in
    /// insertion order. Missing or expired keys read as empty, as do ranges
    /// past the end of the list.
    fn range(&self, key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>>;

    /// Remaining time until `key` expires; `None` when the key is missing,
    /// already expired, or carries no expiry.
    fn time_left(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Resets the expiry of `key` to `ttl` from now. Returns whether a live
    /// key existed to receive the new expiry.
    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;
}
