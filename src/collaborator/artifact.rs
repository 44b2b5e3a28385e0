//! Extraction artifacts
//!
//! One pretty-printed JSON file per successful extraction, written into the
//! results directory.

use crate::error::WorkflowResult;
use crate::models::ExtractionResult;
use crate::validator;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// `<YYYYmmdd_HHMMSS>_<filename with dots replaced>.json`
pub fn artifact_name(filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}.json",
        now.format("%Y%m%d_%H%M%S"),
        filename.replace('.', "_")
    )
}

/// Atomically write an extraction result into `results_dir`
pub fn write_artifact(
    results_dir: &Path,
    filename: &str,
    result: &ExtractionResult,
    now: DateTime<Utc>,
) -> WorkflowResult<PathBuf> {
    fs::create_dir_all(results_dir)?;
    let path = results_dir.join(artifact_name(filename, now));
    let content = serde_json::to_string_pretty(result)?;

    let mut temp_file = NamedTempFile::new_in(results_dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(&path).map_err(|e| e.error)?;

    tracing::debug!(path = %path.display(), "wrote extraction artifact");
    Ok(path)
}

/// Load an artifact, rejecting unknown keys.
///
/// Stored validation flags are discarded and recomputed.
pub fn load_artifact(path: &Path) -> WorkflowResult<ExtractionResult> {
    let content = fs::read_to_string(path)?;
    let result: ExtractionResult = serde_json::from_str(&content)?;
    Ok(validator::validated(result))
}
