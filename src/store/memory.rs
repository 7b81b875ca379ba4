//! In-Memory Key-Value Store
//!
//! The bundled [`KvStore`] backend: a mutex-guarded map with per-key expiry,
//! lazy expiration on access, and optional JSON snapshot persistence. Counter
//! keys follow string-integer semantics, so a counter read back through
//! `get` is an ordinary decimal string.
//!
//! Snapshots store live entries with absolute expiry timestamps; loading a
//! snapshot discards entries whose expiry has already passed.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, Instant};

use super::{KvStore, StoreError, StoreResult};

const SNAPSHOT_VERSION: &str = "1.0";

/// Value kinds a key can hold
#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn scalar(value: String) -> Self {
        Entry {
            value: Value::Scalar(value),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Mutex-guarded map store with lazy expiry
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Restores a store from a snapshot file. A missing file yields an
    /// empty store; entries whose expiry has passed are dropped.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(file)?;

        let now = Instant::now();
        let now_wall = Utc::now();
        let mut entries = HashMap::with_capacity(snapshot.entries.len());
        for stored in snapshot.entries {
            let expires_at = match stored.expires_at.as_deref() {
                Some(timestamp) => {
                    let deadline = DateTime::parse_from_rfc3339(timestamp).map_err(|e| {
                        StoreError::Snapshot(format!(
                            "bad expiry timestamp for key '{}': {e}",
                            stored.key
                        ))
                    })?;
                    match (deadline.with_timezone(&Utc) - now_wall).to_std() {
                        Ok(remaining) => Some(now + remaining),
                        // Deadline is in the past
                        Err(_) => continue,
                    }
                }
                None => None,
            };
            let value = match stored.value {
                SnapshotValue::Scalar(s) => Value::Scalar(s),
                SnapshotValue::List(items) => Value::List(items),
            };
            entries.insert(stored.key, Entry { value, expires_at });
        }

        Ok(MemoryStore {
            entries: Mutex::new(entries),
        })
    }

    /// Writes all live entries to a snapshot file, converting expiry
    /// deadlines to absolute timestamps.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let entries = self.entries.lock();
        let now = Instant::now();
        let now_wall = Utc::now();

        let mut stored = Vec::with_capacity(entries.len());
        for (key, entry) in entries.iter() {
            if entry.is_expired(now) {
                continue;
            }
            let expires_at = entry.expires_at.and_then(|deadline| {
                let remaining = deadline.saturating_duration_since(now);
                chrono::Duration::from_std(remaining)
                    .ok()
                    .map(|d| (now_wall + d).to_rfc3339())
            });
            let value = match &entry.value {
                Value::Scalar(s) => SnapshotValue::Scalar(s.clone()),
                Value::List(items) => SnapshotValue::List(items.clone()),
            };
            stored.push(StoredEntry {
                key: key.clone(),
                value,
                expires_at,
            });
        }
        // Deterministic file contents across runs
        stored.sort_by(|a, b| a.key.cmp(&b.key));

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: now_wall.to_rfc3339(),
            entries: stored,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, &snapshot)?;
        file.sync_all()?;
        Ok(())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock();
        let now = Instant::now();
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        if entries
            .get(key)
            .is_some_and(|e| e.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn incr(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::scalar("0".to_string()));
        match &mut entry.value {
            Value::Scalar(s) => {
                let current: u64 = s.parse().map_err(|_| {
                    StoreError::WrongKind(format!("value at '{key}' is not an integer"))
                })?;
                let next = current + 1;
                *s = next.to_string();
                Ok(next)
            }
            Value::List(_) => Err(StoreError::WrongKind(format!(
                "key '{key}' holds a list, expected an integer"
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), Entry::scalar(value.to_string()));
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        match entries.get(key) {
            Some(Entry {
                value: Value::Scalar(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongKind(format!(
                "key '{key}' holds a list, expected a scalar"
            ))),
            None => Ok(None),
        }
    }

    fn append(&self, key: &str, items: Vec<String>, ttl: Duration) -> StoreResult<u64> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(Vec::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::List(list) => {
                list.extend(items);
                let len = list.len() as u64;
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(len)
            }
            Value::Scalar(_) => Err(StoreError::WrongKind(format!(
                "key '{key}' holds a scalar, expected a list"
            ))),
        }
    }

    fn range(&self, key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        match entries.get(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                if stop < start || start >= list.len() as u64 {
                    return Ok(Vec::new());
                }
                let end = stop.saturating_add(1).min(list.len() as u64);
                Ok(list[start as usize..end as usize].to_vec())
            }
            Some(_) => Err(StoreError::WrongKind(format!(
                "key '{key}' holds a scalar, expected a list"
            ))),
            None => Ok(Vec::new()),
        }
    }

    fn time_left(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        let now = Instant::now();
        Ok(entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        Self::evict_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// On-disk snapshot document
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: String,
    saved_at: String,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: SnapshotValue,
    /// RFC 3339 expiry timestamp; absent for persistent keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SnapshotValue {
    Scalar(String),
    List(Vec<String>),
}
