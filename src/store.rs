// SPDX-License-Identifier: MIT
//! Synchronous key-value stores backing the queue, the trace buffer, and the
//! auth token.
//!
//! Two lifetimes, mirroring the browser storage the client originally used:
//!
//! - [`FileStore`] — persistent, survives process restarts (localStorage).
//!   One JSON object file under the data dir, rewritten on every `set`.
//! - [`MemoryStore`] — session-scoped, gone when the process exits
//!   (sessionStorage).
//!
//! Reads and writes are synchronous and unlocked across async suspension
//! points: two overlapping `send` calls can interleave read-modify-write on
//! the same key. Accepted limitation of the source design.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::error::TelemetryError;
use crate::report::{ActionRecord, ErrorInput, ErrorReport};

/// Persistent-store key holding the JSON array of undelivered reports.
pub const KEY_ERROR_CACHE: &str = "errorCache";
/// Session-store key holding the JSON array of captured actions.
pub const KEY_ACTIONS: &str = "actions";
/// Session-store key holding the raw bearer token.
pub const KEY_TOKEN: &str = "error-log-token";

// ─── KvStore ──────────────────────────────────────────────────────────────────

/// Durable-enough, synchronous string-to-string store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError>;
    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError>;
}

/// Session-scoped in-process store.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError> {
        let map = self.map.lock().map_err(TelemetryError::storage)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        let mut map = self.map.lock().map_err(TelemetryError::storage)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistent store: one JSON object file, loaded lazily, rewritten in full
/// on every `set`. A missing or unreadable file reads as empty.
pub struct FileStore {
    path: PathBuf,
    /// `None` until the first access; then the parsed file contents.
    map: Mutex<Option<HashMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map: Mutex::new(None),
        }
    }

    fn load(&self) -> HashMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), err = %e, "cache file corrupt — starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), TelemetryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(TelemetryError::storage)?;
        }
        let text = serde_json::to_string(map)?;
        std::fs::write(&self.path, text).map_err(TelemetryError::storage)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError> {
        let mut guard = self.map.lock().map_err(TelemetryError::storage)?;
        let map = guard.get_or_insert_with(|| self.load());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        let mut guard = self.map.lock().map_err(TelemetryError::storage)?;
        let map = guard.get_or_insert_with(|| self.load());
        map.insert(key.to_string(), value.to_string());
        self.persist(map)
    }
}

// ─── Typed views ──────────────────────────────────────────────────────────────

fn read_array<T: serde::de::DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Vec<T>, TelemetryError> {
    match store.get(key)? {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Vec::new()),
    }
}

fn write_array<T: serde::Serialize>(
    store: &dyn KvStore,
    key: &str,
    items: &[T],
) -> Result<(), TelemetryError> {
    store.set(key, &serde_json::to_string(items)?)
}

/// Ordered queue of undelivered reports in the persistent store.
///
/// Entries decode as [`ErrorInput`], not [`ErrorReport`]: a cache written by
/// an older client (or by hand) may hold raw, timestamp-less errors, and
/// those are re-enriched on replay rather than wedging the queue. Contents
/// that don't decode at all are discarded with a warning — one bad value
/// must never permanently block caching or replay.
#[derive(Clone)]
pub struct ReportQueue {
    store: Arc<dyn KvStore>,
}

impl ReportQueue {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn read(&self) -> Result<Vec<ErrorInput>, TelemetryError> {
        match self.store.get(KEY_ERROR_CACHE)? {
            Some(text) => match serde_json::from_str(&text) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!(err = %e, "error cache undecodable — discarding it");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    /// Append one report. Errors are the caller's to log; the queue makes no
    /// attempt to retry a failed write.
    pub fn push(&self, report: &ErrorReport) -> Result<(), TelemetryError> {
        let mut entries = self.read()?;
        entries.push(ErrorInput::Enriched(report.clone()));
        write_array(self.store.as_ref(), KEY_ERROR_CACHE, &entries)
    }

    /// Read all queued entries and reset the queue to empty, in that order.
    /// Entries that fail again during replay are re-appended by the caller,
    /// never duplicated by the drain itself.
    pub fn drain(&self) -> Result<Vec<ErrorInput>, TelemetryError> {
        let entries = self.read()?;
        write_array::<ErrorInput>(self.store.as_ref(), KEY_ERROR_CACHE, &[])?;
        Ok(entries)
    }

    /// Read without clearing. Test and debugging aid.
    pub fn peek(&self) -> Result<Vec<ErrorInput>, TelemetryError> {
        self.read()
    }

    pub fn len(&self) -> Result<usize, TelemetryError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TelemetryError> {
        Ok(self.len()? == 0)
    }
}

/// Ordered trail of captured actions in the session store.
#[derive(Clone)]
pub struct TraceBuffer {
    store: Arc<dyn KvStore>,
}

impl TraceBuffer {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn append(&self, record: ActionRecord) -> Result<(), TelemetryError> {
        let mut actions: Vec<ActionRecord> = read_array(self.store.as_ref(), KEY_ACTIONS)?;
        actions.push(record);
        write_array(self.store.as_ref(), KEY_ACTIONS, &actions)
    }

    /// Read the whole trail and reset it to empty. Called exactly once per
    /// constructed report, so no action is attributed to two reports.
    pub fn drain(&self) -> Result<Vec<ActionRecord>, TelemetryError> {
        let actions: Vec<ActionRecord> = read_array(self.store.as_ref(), KEY_ACTIONS)?;
        write_array::<ActionRecord>(self.store.as_ref(), KEY_ACTIONS, &[])?;
        Ok(actions)
    }

    /// Read without clearing. Test and debugging aid.
    pub fn peek(&self) -> Result<Vec<ActionRecord>, TelemetryError> {
        read_array(self.store.as_ref(), KEY_ACTIONS)
    }
}

/// The session-scoped bearer token, if any.
#[derive(Clone)]
pub struct TokenCell {
    store: Arc<dyn KvStore>,
}

impl TokenCell {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Option<String> {
        self.store.get(KEY_TOKEN).ok().flatten()
    }

    pub fn put(&self, token: &str) -> Result<(), TelemetryError> {
        self.store.set(KEY_TOKEN, token)
    }

    /// The value placed after `Bearer ` on delivery: the held token, or the
    /// literal `"null"` when none was ever issued — which is what a browser
    /// `sessionStorage.getItem` miss stringified to, and what the backend
    /// expects for unauthenticated submissions.
    pub fn bearer(&self) -> String {
        self.get().unwrap_or_else(|| "null".to_string())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
