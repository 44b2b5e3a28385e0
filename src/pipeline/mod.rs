//! Extraction pipeline
//!
//! Takes documents in at intake, claims pending ones and runs them through
//! text extraction, the field extractor, validation and artifact writing.

mod batch;
mod intake;

pub use batch::{
    BatchOutcome, ClaimOutcome, Extracted, ExtractionRun, Pipeline, ProcessOutcome, ARTIFACT_KEY,
    REVIEW_KEY,
};
pub use intake::{intake_file, unique_filename};
