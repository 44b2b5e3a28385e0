//! Workflow error taxonomy
//!
//! Library operations return [`WorkflowResult`]. The CLI layer wraps these in
//! `anyhow` with context.

use crate::models::WorkflowState;
use std::path::PathBuf;

/// Result type for ledger, state machine and collaborator operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised by the workflow core
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Document not found in ledger: {0}")]
    NotFound(String),

    #[error("No directory configured for state '{0}'")]
    InvalidStateMapping(WorkflowState),

    #[error("Source file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Ledger file {} is corrupt: {reason}", path.display())]
    CorruptLedger { path: PathBuf, reason: String },

    #[error("{field}: {reason}")]
    ValidationDegraded { field: String, reason: String },

    #[error("Illegal transition for {filename}: {from} -> {to}")]
    IllegalTransition {
        filename: String,
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("Failed to move {filename}: {reason}")]
    MoveFailed { filename: String, reason: String },

    #[error("No text extracted from {}", .0.display())]
    EmptyText(PathBuf),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File {} is too large: {size} bytes (max: {max_mb}MB)", path.display())]
    FileTooLarge { path: PathBuf, size: u64, max_mb: u64 },

    #[error("Failed to extract text from {}: {reason}", path.display())]
    TextExtraction { path: PathBuf, reason: String },

    #[error("Field extraction failed: {0}")]
    FieldExtraction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Shorthand for a degraded field parse
    pub fn degraded(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkflowError::ValidationDegraded {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
