//! Binary document formats
//!
//! PDF text comes from `lopdf`, page by page. DOCX is a zip archive whose
//! `word/document.xml` holds the body; runs are read out of it with a regex
//! scan, one line per paragraph.

use crate::error::{WorkflowError, WorkflowResult};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

const DOCX_BODY: &str = "word/document.xml";

fn extraction_error(path: &Path, reason: impl ToString) -> WorkflowError {
    WorkflowError::TextExtraction {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Text of every page plus the page count
pub fn pdf_text(path: &Path) -> WorkflowResult<(String, u32)> {
    let document = lopdf::Document::load(path).map_err(|e| extraction_error(path, e))?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);

    let mut text = String::new();
    for page in &pages {
        // unreadable pages are skipped
        match document.extract_text(&[*page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), page, error = %e, "skipping unreadable page")
            }
        }
    }

    Ok((text, page_count))
}

/// Paragraph text of a Word document
pub fn docx_text(path: &Path) -> WorkflowResult<String> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extraction_error(path, e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| extraction_error(path, format!("{}: {}", DOCX_BODY, e)))?
        .read_to_string(&mut xml)?;

    document_xml_text(&xml).ok_or_else(|| extraction_error(path, "could not scan document body"))
}

fn document_xml_text(xml: &str) -> Option<String> {
    static TOKENS: OnceLock<Option<Regex>> = OnceLock::new();
    let tokens = TOKENS
        .get_or_init(|| {
            Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>|<w:(tab|br)\s*/>").ok()
        })
        .as_ref()?;

    let mut text = String::new();
    for token in tokens.captures_iter(xml) {
        if let Some(run) = token.get(1) {
            text.push_str(&unescape_xml(run.as_str()));
        } else if let Some(tag) = token.get(2) {
            text.push(if tag.as_str() == "tab" { '\t' } else { '\n' });
        } else {
            text.push('\n');
        }
    }
    Some(text)
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
