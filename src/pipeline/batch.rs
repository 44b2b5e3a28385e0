//! Batch claiming and extraction

use crate::collaborator::{
    parse_response, write_artifact, FieldExtractor, ResponseIssue, TextExtractor,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{ExtractionMetadata, ExtractionResult, WorkflowState};
use crate::state::StateMachine;
use crate::validator;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Metadata key holding the artifact path of an extracted document
pub const ARTIFACT_KEY: &str = "extraction_artifact";

/// Metadata key holding the review verdict of an extracted document
pub const REVIEW_KEY: &str = "needs_human_review";

/// Result of extracting one document, before anything is written
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub result: ExtractionResult,
    pub issues: Vec<ResponseIssue>,
}

/// A document that made it to `Extracted`
#[derive(Debug, Clone)]
pub struct Extracted {
    pub artifact: PathBuf,
    pub needs_human_review: bool,
    pub issues: Vec<ResponseIssue>,
}

/// Per-document result of a batch step. `Err` holds the message recorded on
/// the document.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub filename: String,
    pub result: Result<T, String>,
}

impl<T> BatchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub type ClaimOutcome = BatchOutcome<()>;
pub type ProcessOutcome = BatchOutcome<Extracted>;

/// Drives documents from `Pending` through extraction
pub struct Pipeline<T, F> {
    machine: StateMachine,
    results_dir: PathBuf,
    text_extractor: T,
    field_extractor: F,
}

impl<T: TextExtractor, F: FieldExtractor> Pipeline<T, F> {
    pub fn new(
        machine: StateMachine,
        results_dir: impl Into<PathBuf>,
        text_extractor: T,
        field_extractor: F,
    ) -> Self {
        Self {
            machine,
            results_dir: results_dir.into(),
            text_extractor,
            field_extractor,
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    // =========================================================================
    // Claiming
    // =========================================================================

    /// Move the oldest `limit` pending documents into `Processing`
    pub fn claim_pending(&self, limit: usize) -> WorkflowResult<Vec<ClaimOutcome>> {
        let filenames = self
            .machine
            .ledger()
            .next_for_processing(WorkflowState::Pending, limit)?;

        Ok(filenames
            .into_iter()
            .map(|filename| {
                let result = self
                    .machine
                    .move_document(&filename, WorkflowState::Pending, WorkflowState::Processing)
                    .map(|_| ())
                    .map_err(|e| e.to_string());
                BatchOutcome { filename, result }
            })
            .collect())
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Extract the oldest `limit` documents in `Processing`.
    ///
    /// Each failure leaves that document in `Error` and the batch continues.
    pub fn process_batch(&self, limit: usize) -> WorkflowResult<Vec<ProcessOutcome>> {
        self.process_batch_with(limit, |_| {})
    }

    /// [`Self::process_batch`], calling `on_start` before each document
    pub fn process_batch_with(
        &self,
        limit: usize,
        mut on_start: impl FnMut(&str),
    ) -> WorkflowResult<Vec<ProcessOutcome>> {
        let filenames = self
            .machine
            .ledger()
            .next_for_processing(WorkflowState::Processing, limit)?;

        let mut outcomes = Vec::with_capacity(filenames.len());
        for filename in filenames {
            on_start(&filename);
            let result = self.process_one(&filename).map_err(|e| {
                let message = e.to_string();
                tracing::warn!(filename = %filename, error = %message, "extraction failed");
                // the source goes back to pending so a cleanup re-drive can claim it
                if let Err(move_err) = self.machine.return_to_pending(&filename) {
                    tracing::warn!(
                        filename = %filename,
                        error = %move_err,
                        "could not return source file to pending"
                    );
                }
                if let Err(record_err) =
                    self.machine
                        .transition(&filename, WorkflowState::Error, Some(&message))
                {
                    tracing::error!(
                        filename = %filename,
                        error = %record_err,
                        "could not record extraction failure"
                    );
                }
                message
            });
            outcomes.push(BatchOutcome { filename, result });
        }
        Ok(outcomes)
    }

    fn process_one(&self, filename: &str) -> WorkflowResult<Extracted> {
        let source = self
            .machine
            .source_path(filename, WorkflowState::Processing)
            .ok_or(WorkflowError::InvalidStateMapping(WorkflowState::Processing))?;
        if !source.exists() {
            return Err(WorkflowError::SourceMissing(source));
        }

        let run = self.extract_document(&source, filename)?;
        let needs_human_review = run.result.validation_flags.needs_human_review();
        let artifact = write_artifact(&self.results_dir, filename, &run.result, Utc::now())?;

        let metadata = BTreeMap::from([
            (ARTIFACT_KEY.to_string(), artifact.display().to_string()),
            (REVIEW_KEY.to_string(), needs_human_review.to_string()),
        ]);
        self.machine
            .transition_with_metadata(filename, WorkflowState::Extracted, metadata)?;
        let processed = self
            .machine
            .move_to_processed(filename, WorkflowState::Processing)?;

        tracing::info!(
            filename,
            artifact = %artifact.display(),
            processed = %processed.display(),
            needs_human_review,
            "extracted document"
        );

        Ok(Extracted {
            artifact,
            needs_human_review,
            issues: run.issues,
        })
    }

    /// Extract, parse and validate one file without touching the ledger
    pub fn extract_document(&self, path: &Path, filename: &str) -> WorkflowResult<ExtractionRun> {
        let started = Instant::now();

        let text = self.text_extractor.extract(path)?;
        if text.text.trim().is_empty() {
            return Err(WorkflowError::EmptyText(path.to_path_buf()));
        }
        tracing::debug!(filename, chars = text.metadata.text_length_chars, "extracted text");

        let raw = self.field_extractor.extract_fields(&text.text)?;
        let parsed = parse_response(&raw);

        let mut result = parsed.result;
        result.extraction_metadata = Some(ExtractionMetadata {
            source_document: filename.to_string(),
            extraction_timestamp: Utc::now(),
            ai_model_used: self.field_extractor.model_name().to_string(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            total_pages: text.metadata.total_pages,
            file_size_bytes: Some(text.metadata.file_size_bytes),
            extraction_version: "1.0".to_string(),
        });

        Ok(ExtractionRun {
            result: validator::validated(result),
            issues: parsed.issues,
        })
    }
}
