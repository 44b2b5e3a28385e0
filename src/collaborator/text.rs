//! Source document text extraction

use super::formats;
use crate::error::{WorkflowError, WorkflowResult};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Extensions accepted at intake. Legacy binary `.doc` files are not
/// readable and are turned away.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".pdf", ".docx", ".txt", ".md"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// File facts gathered while extracting text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMetadata {
    pub file_size_bytes: u64,
    pub text_length_chars: usize,
    pub total_pages: Option<u32>,
    pub file_extension: String,
}

/// Cleaned document text plus file facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: TextMetadata,
}

/// Turns a source document into plain text
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> WorkflowResult<ExtractedText>;
}

/// Lowercased extension with its leading dot, or empty
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Check that a file can enter the workflow: it exists, has a supported
/// extension and is within the size limit.
pub fn check_intake_file(path: &Path, max_size_mb: u64) -> WorkflowResult<u64> {
    if !path.is_file() {
        return Err(WorkflowError::SourceMissing(path.to_path_buf()));
    }

    let extension = file_extension(path);
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(WorkflowError::UnsupportedFormat(format!(
            "'{}' (supported: {})",
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let size = fs::metadata(path)?.len();
    if size > max_size_mb.saturating_mul(BYTES_PER_MB) {
        return Err(WorkflowError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_mb: max_size_mb,
        });
    }

    Ok(size)
}

/// Collapse whitespace runs to single spaces and drop control characters
pub fn clean_text(raw: &str) -> String {
    static CONTROL: OnceLock<Option<Regex>> = OnceLock::new();
    let control = CONTROL.get_or_init(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").ok());

    let stripped = match control {
        Some(re) => re.replace_all(raw, ""),
        None => raw.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads every intake format.
///
/// Plain text is decoded as UTF-8, falling back to Latin-1. PDF and DOCX go
/// through [`formats`](super::formats); PDFs also report their page count.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    max_size_mb: u64,
}

impl DocumentExtractor {
    pub fn new(max_size_mb: u64) -> Self {
        Self { max_size_mb }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(50)
    }
}

fn read_plain(path: &Path) -> WorkflowResult<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(path = %path.display(), "not valid UTF-8, decoding as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    })
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> WorkflowResult<ExtractedText> {
        let file_size_bytes = check_intake_file(path, self.max_size_mb)?;

        let extension = file_extension(path);
        let (raw, total_pages) = match extension.as_str() {
            ".pdf" => {
                let (text, pages) = formats::pdf_text(path)?;
                (text, Some(pages))
            }
            ".docx" => (formats::docx_text(path)?, None),
            _ => (read_plain(path)?, None),
        };

        let text = clean_text(&raw);
        Ok(ExtractedText {
            metadata: TextMetadata {
                file_size_bytes,
                text_length_chars: text.chars().count(),
                total_pages,
                file_extension: extension,
            },
            text,
        })
    }
}
