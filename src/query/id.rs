//! Query Identifier Allocation

use rand::Rng;
use std::fmt::Write;
use std::sync::Arc;

use crate::store::{KvStore, StoreResult};

/// Allocates unguessable, totally ordered query identifiers
///
/// An id joins 16 bytes of randomness (hex-rendered) to a sequence number
/// from a shared store counter: `"<32 hex chars>_<seq>"`. The random half
/// keeps ids unguessable; the sequence half keeps them unique even under a
/// random collision and orders queries for diagnostics.
pub struct IdAllocator {
    store: Arc<dyn KvStore>,
    counter_key: String,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn KvStore>, namespace: &str) -> Self {
        IdAllocator {
            store,
            counter_key: format!("{namespace}:query:seq"),
        }
    }

    /// Allocates the next id. A store failure aborts the allocation; no id
    /// is handed out unless the sequence increment succeeded.
    pub fn allocate(&self) -> StoreResult<String> {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
        let mut token = String::with_capacity(32);
        for b in &bytes {
            let _ = write!(token, "{b:02x}");
        }
        let seq = self.store.incr(&self.counter_key)?;
        Ok(format!("{token}_{seq}"))
    }
}
