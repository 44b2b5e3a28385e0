//! Document intake: copy a source file into the pending directory and
//! register it.

use crate::collaborator::check_intake_file;
use crate::collaborator::text::file_extension;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{DocumentRecord, WorkflowState};
use crate::state::StateMachine;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// `<YYYYmmdd_HHMMSS>_<cleaned stem>[_<n>]<ext>`, unique within `dir`
pub fn unique_filename(dir: &Path, original: &str, now: DateTime<Utc>) -> String {
    static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\-_. ]").ok());

    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let cleaned = match unsafe_chars {
        Some(re) => re.replace_all(&stem, "").into_owned(),
        None => stem,
    }
    .replace(' ', "_");

    let timestamp = now.format("%Y%m%d_%H%M%S");
    let mut candidate = format!("{}_{}{}", timestamp, cleaned, extension);
    let mut counter = 1;
    while dir.join(&candidate).exists() {
        candidate = format!("{}_{}_{}{}", timestamp, cleaned, counter, extension);
        counter += 1;
    }
    candidate
}

/// Validate `source`, copy it into the pending directory under a unique name
/// and register it. `extra` entries override the gathered file metadata.
pub fn intake_file(
    machine: &StateMachine,
    source: &Path,
    max_size_mb: u64,
    extra: BTreeMap<String, String>,
) -> WorkflowResult<DocumentRecord> {
    let size = check_intake_file(source, max_size_mb)?;
    let pending_dir = machine
        .directories()
        .dir_for(WorkflowState::Pending)
        .ok_or(WorkflowError::InvalidStateMapping(WorkflowState::Pending))?;
    fs::create_dir_all(pending_dir)?;

    let now = Utc::now();
    let original_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = unique_filename(pending_dir, &original_name, now);
    let destination = pending_dir.join(&filename);
    fs::copy(source, &destination)?;

    let source_path = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    let mut metadata = BTreeMap::from([
        ("original_filename".to_string(), original_name),
        ("file_size_bytes".to_string(), size.to_string()),
        ("file_extension".to_string(), file_extension(source)),
        ("upload_timestamp".to_string(), now.to_rfc3339()),
        ("source_path".to_string(), source_path.display().to_string()),
    ]);
    metadata.extend(extra);

    machine
        .ledger()
        .register(&filename, &destination.display().to_string(), metadata)
}
