//! Collaborator boundary
//!
//! Everything the workflow needs from outside the ledger:
//! - Text extraction from source documents (plain text, PDF, DOCX)
//! - AI field extraction (behind [`FieldExtractor`])
//! - Response parsing into the typed model
//! - Extraction artifacts on disk

pub mod artifact;
pub mod fields;
pub mod formats;
#[cfg(feature = "api-direct")]
pub mod openai;
pub mod response;
pub mod text;

pub use artifact::{artifact_name, load_artifact, write_artifact};
pub use fields::{FieldExtractor, SimulatedExtractor};
#[cfg(feature = "api-direct")]
pub use openai::OpenAiExtractor;
pub use response::{parse_response, ParsedResponse, ResponseIssue};
pub use text::{check_intake_file, DocumentExtractor, ExtractedText, TextExtractor, TextMetadata};
