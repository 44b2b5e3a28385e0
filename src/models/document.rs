//! Document lifecycle records
//!
//! One [`DocumentRecord`] per tracked document, keyed by filename in the ledger.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a tracked document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Registered, waiting to be picked up
    Pending,
    /// Claimed for extraction
    Processing,
    /// Extraction artifact written
    Extracted,
    /// Extraction checked by a reviewer
    Validated,
    /// Approved for the grants record
    Approved,
    /// End of the pipeline
    Completed,
    /// Failed; re-driven to Pending by cleanup
    Error,
}

impl WorkflowState {
    /// All states in pipeline order
    pub const ALL: [WorkflowState; 7] = [
        WorkflowState::Pending,
        WorkflowState::Processing,
        WorkflowState::Extracted,
        WorkflowState::Validated,
        WorkflowState::Approved,
        WorkflowState::Completed,
        WorkflowState::Error,
    ];

    /// Persisted (lowercase) name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Pending => "pending",
            WorkflowState::Processing => "processing",
            WorkflowState::Extracted => "extracted",
            WorkflowState::Validated => "validated",
            WorkflowState::Approved => "approved",
            WorkflowState::Completed => "completed",
            WorkflowState::Error => "error",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            WorkflowState::Pending => "📥",
            WorkflowState::Processing => "⚙️",
            WorkflowState::Extracted => "🔍",
            WorkflowState::Validated => "🧾",
            WorkflowState::Approved => "👍",
            WorkflowState::Completed => "✅",
            WorkflowState::Error => "⛔",
        }
    }

    /// States that describe the extraction artifact rather than the source file.
    ///
    /// These never map to a source-file directory.
    pub fn is_artifact_state(&self) -> bool {
        matches!(
            self,
            WorkflowState::Extracted | WorkflowState::Validated | WorkflowState::Approved
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        WorkflowState::ALL
            .into_iter()
            .find(|state| state.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = WorkflowState::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown state '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Ledger entry for a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identity key, unique within the ledger
    pub filename: String,

    /// Path the document was registered from (informational)
    pub original_path: String,

    pub current_state: WorkflowState,

    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,

    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: BTreeMap<String, String>,

    /// Set only while in [`WorkflowState::Error`]
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DocumentRecord {
    /// Create a freshly registered record in `Pending`
    pub fn new(
        filename: impl Into<String>,
        original_path: impl Into<String>,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            filename: filename.into(),
            original_path: original_path.into(),
            current_state: WorkflowState::Pending,
            created_at: now,
            updated_at: now,
            metadata,
            error_message: None,
        }
    }

    /// Rewrite the state and bump `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn apply_state(
        &mut self,
        state: WorkflowState,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.current_state = state;
        self.updated_at = now.max(self.updated_at);
        self.error_message = match state {
            WorkflowState::Error => error_message.filter(|m| !m.trim().is_empty()),
            _ => None,
        };
    }
}

/// ISO-8601 timestamps.
///
/// Written as RFC 3339 in UTC. Offset-less timestamps from older ledgers are
/// read as UTC.
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(naive.and_utc());
            }
        }
        Err(format!("invalid timestamp '{}'", raw))
    }
}

fn lenient_metadata<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}
