//! Execution Engine Seam
//!
//! The query subsystem never speaks SQL itself; it hands statements to a
//! [`SqlEngine`] and consumes the resulting [`Cursor`]. Rows cross the seam
//! as JSON values, which is also how they are stored.
//!
//! [`MemoryEngine`] is the bundled engine: canned results keyed by statement
//! text, delivered through a cursor that can cap its batch size and inject
//! failures. It exists for embedding, demos, and tests; production
//! deployments implement the traits over a real database client.

use std::collections::HashMap;
use thiserror::Error;

/// A single result row, as produced by the execution engine
pub type Row = Vec<serde_json::Value>;

/// Execution failure, carrying the message surfaced to callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Handle over one statement's result stream
pub trait Cursor: Send {
    /// Whether the cursor still has rows to deliver. May fetch ahead.
    fn has_more(&mut self) -> bool;

    /// Ordered `(column name, type token)` pairs describing the result
    /// shape.
    fn schema(&self) -> Vec<(String, String)>;

    /// Pulls up to `n` rows (`n >= 1`). A batch may be shorter than `n`
    /// when the engine delivers rows in its own increments; only an empty
    /// batch signals exhaustion.
    fn next_batch(&mut self, n: usize) -> Result<Vec<Row>, EngineError>;

    /// Whether the cursor has not been closed yet.
    fn is_open(&self) -> bool;

    /// Releases the cursor and any engine-side resources behind it.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// Executes SQL statements against some backing database
pub trait SqlEngine: Send + Sync {
    fn execute(&self, statement: &str) -> Result<Box<dyn Cursor>, EngineError>;
}

/// One statement's canned outcome for [`MemoryEngine`]
#[derive(Debug, Clone, Default)]
pub struct CannedResult {
    /// Result shape as `(column name, type token)` pairs
    pub schema: Vec<(String, String)>,
    pub rows: Vec<Row>,
    /// Caps each delivered batch below the requested size, mimicking
    /// engines that stream rows in their own increments
    pub batch_size: Option<usize>,
    /// Error raised by the pull after the last row
    pub error_after_rows: Option<String>,
    /// Error raised by `close`
    pub close_error: Option<String>,
}

#[derive(Debug, Clone)]
enum Canned {
    Result(CannedResult),
    ExecuteError(String),
}

/// Canned-result engine keyed by statement text
///
/// Unknown statements fail with an execution error, like a real engine
/// rejecting invalid SQL.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    statements: HashMap<String, Canned>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine {
            statements: HashMap::new(),
        }
    }

    /// Register a full canned outcome for a statement
    pub fn register(&mut self, statement: impl Into<String>, result: CannedResult) {
        self.statements
            .insert(statement.into(), Canned::Result(result));
    }

    /// Register a plain result: schema plus rows, default batching
    pub fn register_rows(
        &mut self,
        statement: impl Into<String>,
        schema: Vec<(String, String)>,
        rows: Vec<Row>,
    ) {
        self.register(
            statement,
            CannedResult {
                schema,
                rows,
                ..CannedResult::default()
            },
        );
    }

    /// Register a statement that fails at `execute`
    pub fn register_failure(&mut self, statement: impl Into<String>, message: impl Into<String>) {
        self.statements
            .insert(statement.into(), Canned::ExecuteError(message.into()));
    }
}

impl SqlEngine for MemoryEngine {
    fn execute(&self, statement: &str) -> Result<Box<dyn Cursor>, EngineError> {
        match self.statements.get(statement) {
            Some(Canned::Result(result)) => Ok(Box::new(MemoryCursor::new(result.clone()))),
            Some(Canned::ExecuteError(message)) => Err(EngineError::new(message.clone())),
            None => Err(EngineError::new(format!("unknown statement: {statement}"))),
        }
    }
}

/// Cursor over a canned result
pub struct MemoryCursor {
    result: CannedResult,
    position: usize,
    open: bool,
}

impl MemoryCursor {
    fn new(result: CannedResult) -> Self {
        MemoryCursor {
            result,
            position: 0,
            open: true,
        }
    }
}

impl Cursor for MemoryCursor {
    fn has_more(&mut self) -> bool {
        self.position < self.result.rows.len() || self.result.error_after_rows.is_some()
    }

    fn schema(&self) -> Vec<(String, String)> {
        self.result.schema.clone()
    }

    fn next_batch(&mut self, n: usize) -> Result<Vec<Row>, EngineError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.position >= self.result.rows.len() {
            if let Some(message) = self.result.error_after_rows.take() {
                return Err(EngineError::new(message));
            }
            return Ok(Vec::new());
        }
        let step = self.result.batch_size.map_or(n, |cap| cap.min(n)).max(1);
        let end = (self.position + step).min(self.result.rows.len());
        let batch = self.result.rows[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.open = false;
        match self.result.close_error.take() {
            Some(message) => Err(EngineError::new(message)),
            None => Ok(()),
        }
    }
}
