//! Query Lifecycle Error Types

use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;
use crate::worker::QueueError;

/// Errors surfaced by the query lifecycle
#[derive(Error, Debug)]
pub enum QueryError {
    /// Identifier or sequence allocation failed; nothing was written
    #[error("id allocation failed: {0}")]
    Allocation(#[source] StoreError),

    /// No metadata record exists for the id
    #[error("no such query: {id}")]
    NotFound { id: String },

    /// The statement failed during execution or cursor iteration
    #[error(transparent)]
    Execution(#[from] EngineError),

    /// The cursor reported a column type token the catalog does not resolve
    #[error("unresolved column domain: {token}")]
    UnresolvedDomain { token: String },

    /// The backing store failed an operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job transport refused the work item
    #[error("job transport failed: {0}")]
    Transport(#[from] QueueError),
}

/// Result type for query lifecycle operations
pub type QueryResult<T> = Result<T, QueryError>;
