//! StateMachine - lifecycle transitions over the ledger

use crate::error::{WorkflowError, WorkflowResult};
use crate::ledger::DocumentLedger;
use crate::models::{
    DocumentRecord, StateDirectories, TransitionPolicy, WorkflowConfig, WorkflowLayout,
    WorkflowState,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Whether `from -> to` is on the transition whitelist.
///
/// Any state may fail into `Error` or be re-set to itself.
pub fn is_whitelisted(from: WorkflowState, to: WorkflowState) -> bool {
    use WorkflowState::*;

    if from == to || to == Error {
        return true;
    }

    matches!(
        (from, to),
        (Error, Pending)
            | (Pending, Processing)
            | (Processing, Extracted)
            | (Processing, Pending)
            | (Extracted, Validated)
            | (Extracted, Processing)
            | (Validated, Approved)
            | (Validated, Extracted)
            | (Approved, Completed)
    )
}

/// A file relocation the caller (or [`StateMachine::move_document`]) performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub filename: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Relocation {
    /// Move the file, creating the destination directory.
    ///
    /// Falls back to copy + remove when rename fails (e.g. across devices).
    pub fn execute(&self) -> io::Result<()> {
        if let Some(parent) = self.to.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(&self.from, &self.to).is_ok() {
            return Ok(());
        }

        fs::copy(&self.from, &self.to)?;
        fs::remove_file(&self.from)
    }
}

/// Applies transitions to ledger records.
///
/// Holds no document state of its own; every operation goes through the
/// ledger file.
#[derive(Debug, Clone)]
pub struct StateMachine {
    ledger: DocumentLedger,
    dirs: StateDirectories,
    processed_dir: Option<PathBuf>,
    policy: TransitionPolicy,
}

impl StateMachine {
    pub fn new(ledger: DocumentLedger, dirs: StateDirectories, policy: TransitionPolicy) -> Self {
        Self {
            ledger,
            dirs,
            processed_dir: None,
            policy,
        }
    }

    /// Directory source files are moved into once extracted
    pub fn with_processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = Some(dir.into());
        self
    }

    /// Build from resolved configuration
    pub fn from_config(config: &WorkflowConfig, layout: &WorkflowLayout) -> Self {
        let ledger = DocumentLedger::new(&layout.ledger_path)
            .with_corrupt_policy(config.on_corrupt_ledger);
        Self::new(ledger, layout.state_dirs.clone(), config.transition_policy)
            .with_processed_dir(&layout.processed_dir)
    }

    pub fn ledger(&self) -> &DocumentLedger {
        &self.ledger
    }

    pub fn directories(&self) -> &StateDirectories {
        &self.dirs
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Reject transitions the policy does not allow
    pub fn check_transition(
        &self,
        filename: &str,
        from: WorkflowState,
        to: WorkflowState,
    ) -> WorkflowResult<()> {
        match self.policy {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Strict if is_whitelisted(from, to) => Ok(()),
            TransitionPolicy::Strict => Err(WorkflowError::IllegalTransition {
                filename: filename.to_string(),
                from,
                to,
            }),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Record a new state for a document. Never touches files.
    pub fn transition(
        &self,
        filename: &str,
        new_state: WorkflowState,
        error_message: Option<&str>,
    ) -> WorkflowResult<DocumentRecord> {
        self.transition_at(filename, new_state, error_message, Utc::now())
    }

    pub fn transition_at(
        &self,
        filename: &str,
        new_state: WorkflowState,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<DocumentRecord> {
        self.apply(filename, new_state, error_message, BTreeMap::new(), now)
    }

    /// Transition and merge `metadata` into the record in the same save
    pub fn transition_with_metadata(
        &self,
        filename: &str,
        new_state: WorkflowState,
        metadata: BTreeMap<String, String>,
    ) -> WorkflowResult<DocumentRecord> {
        self.apply(filename, new_state, None, metadata, Utc::now())
    }

    fn apply(
        &self,
        filename: &str,
        new_state: WorkflowState,
        error_message: Option<&str>,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<DocumentRecord> {
        self.ledger.modify(filename, |record| {
            self.check_transition(filename, record.current_state, new_state)?;
            let old_state = record.current_state;
            record.apply_state(new_state, error_message.map(str::to_string), now);
            record.metadata.extend(metadata);
            tracing::info!(filename, from = %old_state, to = %new_state, "transitioned document");
            Ok(())
        })
    }

    /// Force a document into `Error`, keeping the original failure if the
    /// ledger write itself fails.
    fn record_failure(&self, filename: &str, message: &str) {
        tracing::warn!(filename, error = message, "recording document failure");
        if let Err(e) = self.transition(filename, WorkflowState::Error, Some(message)) {
            tracing::error!(filename, error = %e, "could not record failure in ledger");
        }
    }

    // =========================================================================
    // File relocation
    // =========================================================================

    /// Compute where a source file moves for `from -> to`
    pub fn plan_move(
        &self,
        filename: &str,
        from: WorkflowState,
        to: WorkflowState,
    ) -> WorkflowResult<Relocation> {
        let from_dir = self
            .dirs
            .dir_for(from)
            .ok_or(WorkflowError::InvalidStateMapping(from))?;
        let to_dir = self
            .dirs
            .dir_for(to)
            .ok_or(WorkflowError::InvalidStateMapping(to))?;

        Ok(Relocation {
            filename: filename.to_string(),
            from: from_dir.join(filename),
            to: to_dir.join(filename),
        })
    }

    /// Move the backing file between state directories, then transition.
    ///
    /// A missing source or failed move leaves the record in `Error` with the
    /// failure message, and the error is returned.
    pub fn move_document(
        &self,
        filename: &str,
        from: WorkflowState,
        to: WorkflowState,
    ) -> WorkflowResult<DocumentRecord> {
        let relocation = self.plan_move(filename, from, to)?;

        let record = self
            .ledger
            .get(filename)?
            .ok_or_else(|| WorkflowError::NotFound(filename.to_string()))?;
        self.check_transition(filename, record.current_state, to)?;

        if !relocation.from.exists() {
            let err = WorkflowError::SourceMissing(relocation.from.clone());
            self.record_failure(filename, &err.to_string());
            return Err(err);
        }

        if let Err(e) = relocation.execute() {
            let err = WorkflowError::MoveFailed {
                filename: filename.to_string(),
                reason: e.to_string(),
            };
            self.record_failure(filename, &err.to_string());
            return Err(err);
        }

        tracing::debug!(
            filename,
            from = %relocation.from.display(),
            to = %relocation.to.display(),
            "moved document file"
        );

        self.transition(filename, to, None)
    }

    /// Move an extracted source file out of its state directory into the
    /// processed directory. The record is left as is.
    pub fn move_to_processed(&self, filename: &str, from: WorkflowState) -> WorkflowResult<PathBuf> {
        let from_dir = self
            .dirs
            .dir_for(from)
            .ok_or(WorkflowError::InvalidStateMapping(from))?;
        let processed_dir = self.processed_dir.as_deref().ok_or_else(|| {
            WorkflowError::InvalidConfig("no processed directory configured".to_string())
        })?;

        let relocation = Relocation {
            filename: filename.to_string(),
            from: from_dir.join(filename),
            to: processed_dir.join(filename),
        };

        if !relocation.from.exists() {
            return Err(WorkflowError::SourceMissing(relocation.from));
        }
        relocation
            .execute()
            .map_err(|e| WorkflowError::MoveFailed {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;

        Ok(relocation.to)
    }

    /// Put a source file left in another state directory back into the
    /// `Pending` directory. Returns the new path if a file was moved.
    pub fn return_to_pending(&self, filename: &str) -> WorkflowResult<Option<PathBuf>> {
        let pending = self
            .source_path(filename, WorkflowState::Pending)
            .ok_or(WorkflowError::InvalidStateMapping(WorkflowState::Pending))?;
        if pending.exists() {
            return Ok(None);
        }

        let stray = self
            .dirs
            .iter()
            .filter(|(state, _)| *state != WorkflowState::Pending)
            .map(|(_, dir)| dir.join(filename))
            .find(|path| path.exists());
        let Some(from) = stray else {
            return Ok(None);
        };

        let relocation = Relocation {
            filename: filename.to_string(),
            from,
            to: pending,
        };
        relocation
            .execute()
            .map_err(|e| WorkflowError::MoveFailed {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            filename,
            from = %relocation.from.display(),
            "returned source file to pending"
        );
        Ok(Some(relocation.to))
    }

    /// Path of a document's source file while it is in `state`
    pub fn source_path(&self, filename: &str, state: WorkflowState) -> Option<PathBuf> {
        self.dirs.dir_for(state).map(|dir| dir.join(filename))
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Re-drive every `Error` record to `Pending`. Returns the filenames.
    ///
    /// Source files stranded in another state directory are moved back so
    /// the next claim finds them. A file that cannot be moved is logged and
    /// the record is still re-driven.
    pub fn cleanup_errors(&self) -> WorkflowResult<Vec<String>> {
        let mut recovered = Vec::new();
        for record in self.ledger.query_by_state(WorkflowState::Error)? {
            tracing::info!(filename = %record.filename, "moving error document back to pending");
            if self.dirs.dir_for(WorkflowState::Pending).is_some() {
                if let Err(e) = self.return_to_pending(&record.filename) {
                    tracing::warn!(filename = %record.filename, error = %e, "source file left in place");
                }
            }
            self.transition(&record.filename, WorkflowState::Pending, None)?;
            recovered.push(record.filename);
        }
        Ok(recovered)
    }
}

// =============================================================================
// Tests
// =============================================================================
