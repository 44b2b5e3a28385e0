//! DocumentLedger - workflow_status.json persistence
//!
//! The ledger file is the single source of truth. Every mutation is a full
//! load-mutate-save cycle; nothing is cached between calls.
//!
//! There is no cross-process lock around that cycle. Two processes mutating
//! the same ledger concurrently race and the last save wins. Saves are atomic,
//! so a reader never sees a truncated or mixed-version file.

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{CorruptLedgerPolicy, DocumentRecord, WorkflowState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Full ledger contents, keyed by filename
pub type LedgerMap = BTreeMap<String, DocumentRecord>;

/// Durable filename -> record store
#[derive(Debug, Clone)]
pub struct DocumentLedger {
    path: PathBuf,
    corrupt_policy: CorruptLedgerPolicy,
}

impl DocumentLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            corrupt_policy: CorruptLedgerPolicy::Fail,
        }
    }

    pub fn with_corrupt_policy(mut self, policy: CorruptLedgerPolicy) -> Self {
        self.corrupt_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Read the persisted ledger.
    ///
    /// A missing file is an empty ledger. An unparseable one is
    /// [`WorkflowError::CorruptLedger`].
    pub fn load(&self) -> WorkflowResult<LedgerMap> {
        if !self.path.exists() {
            return Ok(LedgerMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut map: LedgerMap =
            serde_json::from_str(&content).map_err(|e| WorkflowError::CorruptLedger {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        for (key, record) in map.iter_mut() {
            if &record.filename != key {
                tracing::warn!(
                    key = %key,
                    filename = %record.filename,
                    "ledger entry key disagrees with its filename, using the key"
                );
                record.filename = key.clone();
            }
        }

        Ok(map)
    }

    /// Like [`load`](Self::load), but a corrupt file is renamed aside and an
    /// empty ledger returned.
    pub fn load_or_recover(&self) -> WorkflowResult<LedgerMap> {
        match self.load() {
            Err(WorkflowError::CorruptLedger { path, reason }) => {
                let backup = corrupt_backup_path(&path, Utc::now());
                fs::rename(&path, &backup)?;
                tracing::warn!(
                    ledger = %path.display(),
                    backup = %backup.display(),
                    %reason,
                    "ledger was corrupt; moved it aside and started an empty ledger"
                );
                Ok(LedgerMap::new())
            }
            other => other,
        }
    }

    /// Load according to the configured corruption policy
    pub fn read(&self) -> WorkflowResult<LedgerMap> {
        match self.corrupt_policy {
            CorruptLedgerPolicy::Fail => self.load(),
            CorruptLedgerPolicy::BackupAndReset => self.load_or_recover(),
        }
    }

    /// Atomically persist the full ledger.
    ///
    /// Writes a temp file in the ledger's directory, syncs it, then renames it
    /// over the ledger.
    pub fn save(&self, map: &LedgerMap) -> WorkflowResult<()> {
        let content = serde_json::to_string_pretty(map)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp_file = NamedTempFile::new_in(&parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;

        temp_file
            .persist(&self.path)
            .map_err(|e| WorkflowError::Io(e.error))?;

        Ok(())
    }

    // =========================================================================
    // Registration and mutation
    // =========================================================================

    /// Insert or overwrite a record in `Pending`
    pub fn register(
        &self,
        filename: &str,
        original_path: &str,
        metadata: BTreeMap<String, String>,
    ) -> WorkflowResult<DocumentRecord> {
        self.register_at(filename, original_path, metadata, Utc::now())
    }

    pub fn register_at(
        &self,
        filename: &str,
        original_path: &str,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<DocumentRecord> {
        let mut map = self.read()?;
        let record = DocumentRecord::new(filename, original_path, metadata, now);

        if map.insert(filename.to_string(), record.clone()).is_some() {
            tracing::info!(filename, "re-registered document, previous record replaced");
        } else {
            tracing::info!(filename, "registered document");
        }

        self.save(&map)?;
        Ok(record)
    }

    /// Load, apply `f` to one record, save.
    ///
    /// Nothing is written if the record is missing or `f` fails.
    pub fn modify<F>(&self, filename: &str, f: F) -> WorkflowResult<DocumentRecord>
    where
        F: FnOnce(&mut DocumentRecord) -> WorkflowResult<()>,
    {
        let mut map = self.read()?;
        let record = map
            .get_mut(filename)
            .ok_or_else(|| WorkflowError::NotFound(filename.to_string()))?;

        f(record)?;
        let updated = record.clone();

        self.save(&map)?;
        Ok(updated)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, filename: &str) -> WorkflowResult<Option<DocumentRecord>> {
        Ok(self.read()?.remove(filename))
    }

    /// Records in `state`, oldest first, ties broken by filename
    pub fn query_by_state(&self, state: WorkflowState) -> WorkflowResult<Vec<DocumentRecord>> {
        let mut records: Vec<DocumentRecord> = self
            .read()?
            .into_values()
            .filter(|r| r.current_state == state)
            .collect();

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(records)
    }

    /// Filenames to process next in `state`
    pub fn next_for_processing(
        &self,
        state: WorkflowState,
        limit: usize,
    ) -> WorkflowResult<Vec<String>> {
        Ok(self
            .query_by_state(state)?
            .into_iter()
            .take(limit)
            .map(|r| r.filename)
            .collect())
    }

    /// Most recently updated records first
    pub fn recent(&self, limit: usize) -> WorkflowResult<Vec<DocumentRecord>> {
        let mut records: Vec<DocumentRecord> = self.read()?.into_values().collect();
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        records.truncate(limit);
        Ok(records)
    }

    /// Document count per state, in pipeline order
    pub fn summary(&self) -> WorkflowResult<Vec<(WorkflowState, usize)>> {
        let map = self.read()?;
        Ok(WorkflowState::ALL
            .into_iter()
            .map(|state| {
                let count = map.values().filter(|r| r.current_state == state).count();
                (state, count)
            })
            .collect())
    }
}

fn corrupt_backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "workflow_status.json".to_string());
    path.with_file_name(format!("{}.corrupt-{}", name, now.format("%Y%m%d%H%M%S")))
}

// =============================================================================
// Tests
// =============================================================================
