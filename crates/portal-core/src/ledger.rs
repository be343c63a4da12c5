//! Local request ledger
//!
//! Bounded history of submitted requests, kept as one JSON array under a
//! single key of a [`KeyValueStore`]. Oldest entries are evicted first once
//! the cap is reached.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::form::FormValues;
use crate::models::CatalogItemRef;
use crate::orchestrator::SubmissionOutcome;
use crate::{PortalError, Result};

pub const LEDGER_KEY: &str = "servicenow_requests";
pub const LEDGER_CAPACITY: usize = 50;

// =============================================================================
// Stores
// =============================================================================

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| storage(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PortalError::Storage(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn storage(path: &Path, e: std::io::Error) -> PortalError {
    PortalError::Storage(format!("{}: {}", path.display(), e))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;
        // Write then rename so a crash never leaves half a document behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| storage(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| storage(&path, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(storage(&path, e)),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| storage(&self.dir, e))?;
        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// =============================================================================
// Entries
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// A real record exists upstream.
    #[serde(alias = "created_in_servicenow")]
    CreatedUpstream,
    /// Some or all of the record was simulated and needs manual follow-up.
    PendingManualProcessing,
    InProgress,
    Completed,
}

impl RequestStatus {
    fn rank(self) -> u8 {
        match self {
            RequestStatus::CreatedUpstream | RequestStatus::PendingManualProcessing => 0,
            RequestStatus::InProgress => 1,
            RequestStatus::Completed => 2,
        }
    }

    /// Statuses only move forward; `completed` is terminal.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        self == next || next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::CreatedUpstream => "created_upstream",
            RequestStatus::PendingManualProcessing => "pending_manual_processing",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "created_upstream" | "created_in_servicenow" => Ok(RequestStatus::CreatedUpstream),
            "pending_manual_processing" | "pending" => Ok(RequestStatus::PendingManualProcessing),
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            other => Err(PortalError::Config(format!("unknown request status: {}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub number: String,
    pub sys_id: String,
    pub catalog_item: CatalogItemRef,
    pub form_data: FormValues,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
    pub status: RequestStatus,
    #[serde(default = "default_level")]
    pub priority: String,
    #[serde(default = "default_level")]
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

fn default_level() -> String {
    "medium".to_string()
}

impl StoredRequest {
    pub fn from_outcome(
        outcome: &SubmissionOutcome,
        catalog_item: CatalogItemRef,
        form_data: FormValues,
        submitted_by: impl Into<String>,
    ) -> Self {
        let status = if outcome.is_simulated {
            RequestStatus::PendingManualProcessing
        } else {
            RequestStatus::CreatedUpstream
        };

        Self {
            number: outcome.display_number.clone(),
            sys_id: outcome.record_id.clone(),
            catalog_item,
            form_data,
            submitted_at: outcome.created_at,
            submitted_by: submitted_by.into(),
            status,
            priority: default_level(),
            impact: default_level(),
            table: Some(outcome.table.clone()),
            strategy: Some(outcome.strategy_used.to_string()),
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

pub struct RequestLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl RequestLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, key: LEDGER_KEY.to_string(), capacity: LEDGER_CAPACITY, write_lock: Mutex::new(()) }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn load(&self) -> Result<Vec<StoredRequest>> {
        match self.store.get(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Entries to write back to. Store failures propagate; an undecodable
    /// document is replaced.
    fn load_for_write(&self) -> Result<Vec<StoredRequest>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "ledger unreadable, starting a new one");
            Vec::new()
        }))
    }

    fn save(&self, entries: &[StoredRequest]) -> Result<()> {
        self.store.set(&self.key, &serde_json::to_string(entries)?)
    }

    /// Appends an entry, evicting the oldest ones beyond capacity.
    pub fn append(&self, entry: StoredRequest) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load_for_write()?;
        let number = entry.number.clone();
        entries.push(entry);

        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
            debug!(evicted = excess, "ledger over capacity");
        }

        self.save(&entries)?;
        info!(number = %number, "request saved to ledger");
        Ok(())
    }

    /// Entries in insertion order, oldest first. An unreadable ledger reads as
    /// empty.
    pub fn list_all(&self) -> Vec<StoredRequest> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load ledger");
            Vec::new()
        })
    }

    /// Entries newest first, for display.
    pub fn list_newest_first(&self) -> Vec<StoredRequest> {
        let mut entries = self.list_all();
        entries.reverse();
        entries
    }

    pub fn find_by_number(&self, number: &str) -> Option<StoredRequest> {
        self.list_all().into_iter().find(|r| r.number == number)
    }

    pub fn find_by_record_id(&self, sys_id: &str) -> Option<StoredRequest> {
        self.list_all().into_iter().find(|r| r.sys_id == sys_id)
    }

    /// Moves an entry to `status`. Returns `Ok(false)` when no entry has that
    /// number.
    pub fn update_status(&self, number: &str, status: RequestStatus) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load_for_write()?;

        let Some(entry) = entries.iter_mut().find(|r| r.number == number) else {
            return Ok(false);
        };
        if !entry.status.can_transition_to(status) {
            return Err(PortalError::InvalidTransition { from: entry.status.to_string(), to: status.to_string() });
        }
        entry.status = status;

        self.save(&entries)?;
        info!(number = %number, status = %status, "request status updated");
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.store.remove(&self.key)?;
        info!("ledger cleared");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.list_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
