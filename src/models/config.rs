//! Workflow configuration (`grantflow.toml`)

use super::document::WorkflowState;
use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file name, relative to the base directory
pub const CONFIG_FILE: &str = "grantflow.toml";

/// How the state machine treats transitions outside the whitelist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Only whitelisted transitions are accepted
    #[default]
    Strict,
    /// Any target state is accepted
    Permissive,
}

/// What to do when the ledger file cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptLedgerPolicy {
    /// Surface the corruption as an error
    #[default]
    Fail,
    /// Move the corrupt file aside and start from an empty ledger
    BackupAndReset,
}

/// Grantflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Ledger file
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Where extraction artifacts are written
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Where source files go once extracted
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    #[serde(default)]
    pub transition_policy: TransitionPolicy,

    #[serde(default)]
    pub on_corrupt_ledger: CorruptLedgerPolicy,

    /// Documents handled per batch
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Largest source file accepted for extraction
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Model asked for field extraction when an API backend is available
    #[serde(default = "default_ai_model")]
    pub ai_model: String,

    /// Source-file directory per state (state name -> directory)
    #[serde(default = "default_state_dirs")]
    pub state_dirs: BTreeMap<String, PathBuf>,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("workflows/workflow_status.json")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("workflows/extracted")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("intake/processed")
}

fn default_state_dirs() -> BTreeMap<String, PathBuf> {
    BTreeMap::from([
        ("pending".to_string(), PathBuf::from("intake/pending")),
        ("processing".to_string(), PathBuf::from("intake/processing")),
    ])
}

fn default_batch_limit() -> usize {
    10
}

fn default_max_file_size_mb() -> u64 {
    50
}

fn default_ai_model() -> String {
    "gpt-4".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            results_dir: default_results_dir(),
            processed_dir: default_processed_dir(),
            state_dirs: default_state_dirs(),
            transition_policy: TransitionPolicy::default(),
            on_corrupt_ledger: CorruptLedgerPolicy::default(),
            batch_limit: default_batch_limit(),
            max_file_size_mb: default_max_file_size_mb(),
            ai_model: default_ai_model(),
        }
    }
}

impl WorkflowConfig {
    /// Load config from `<base>/grantflow.toml`, falling back to defaults.
    ///
    /// `GRANTFLOW_BATCH_LIMIT`, `GRANTFLOW_MAX_FILE_SIZE_MB` and
    /// `GRANTFLOW_AI_MODEL` override the file.
    pub fn load(base: &Path) -> WorkflowResult<Self> {
        let config_path = base.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                WorkflowError::InvalidConfig(format!("{}: {}", config_path.display(), e))
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save config to `<base>/grantflow.toml`
    pub fn save(&self, base: &Path) -> WorkflowResult<()> {
        std::fs::create_dir_all(base)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        std::fs::write(base.join(CONFIG_FILE), content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("GRANTFLOW_BATCH_LIMIT") {
            match raw.trim().parse() {
                Ok(limit) => self.batch_limit = limit,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid GRANTFLOW_BATCH_LIMIT"),
            }
        }
        if let Some(raw) = lookup("GRANTFLOW_MAX_FILE_SIZE_MB") {
            match raw.trim().parse() {
                Ok(size) => self.max_file_size_mb = size,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid GRANTFLOW_MAX_FILE_SIZE_MB"),
            }
        }
        if let Some(model) = lookup("GRANTFLOW_AI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.ai_model = model.trim().to_string();
        }
    }

    /// Resolve every configured path against `base`
    pub fn layout(&self, base: &Path) -> WorkflowResult<WorkflowLayout> {
        let mut dirs = BTreeMap::new();
        for (name, dir) in &self.state_dirs {
            let state: WorkflowState = name
                .parse()
                .map_err(|e: String| WorkflowError::InvalidConfig(format!("state_dirs: {}", e)))?;
            dirs.insert(state, base.join(dir));
        }

        Ok(WorkflowLayout {
            base: base.to_path_buf(),
            ledger_path: base.join(&self.ledger_path),
            results_dir: base.join(&self.results_dir),
            processed_dir: base.join(&self.processed_dir),
            state_dirs: StateDirectories::new(dirs)?,
        })
    }
}

/// Fixed table of source-file directories per state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDirectories {
    dirs: BTreeMap<WorkflowState, PathBuf>,
}

impl StateDirectories {
    /// Build the table. Artifact states (extracted, validated, approved) cannot
    /// hold source files and are rejected.
    pub fn new(dirs: BTreeMap<WorkflowState, PathBuf>) -> WorkflowResult<Self> {
        if let Some(state) = dirs.keys().find(|state| state.is_artifact_state()) {
            return Err(WorkflowError::InvalidConfig(format!(
                "state '{}' describes the extraction artifact and cannot map to a source directory",
                state
            )));
        }
        Ok(Self { dirs })
    }

    pub fn dir_for(&self, state: WorkflowState) -> Option<&Path> {
        self.dirs.get(&state).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkflowState, &Path)> {
        self.dirs.iter().map(|(state, dir)| (*state, dir.as_path()))
    }
}

/// Absolute paths the workflow operates on
#[derive(Debug, Clone)]
pub struct WorkflowLayout {
    pub base: PathBuf,
    pub ledger_path: PathBuf,
    pub results_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub state_dirs: StateDirectories,
}

impl WorkflowLayout {
    /// Create every directory the layout refers to
    pub fn ensure_directories(&self) -> WorkflowResult<()> {
        for (_, dir) in self.state_dirs.iter() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::create_dir_all(&self.results_dir)?;
        std::fs::create_dir_all(&self.processed_dir)?;
        if let Some(parent) = self.ledger_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = WorkflowConfig::load(temp.path()).unwrap();

        assert_eq!(config.transition_policy, TransitionPolicy::Strict);
        assert_eq!(config.on_corrupt_ledger, CorruptLedgerPolicy::Fail);
        assert_eq!(config.ledger_path, PathBuf::from("workflows/workflow_status.json"));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut config = WorkflowConfig::default();
        config.transition_policy = TransitionPolicy::Permissive;
        config.on_corrupt_ledger = CorruptLedgerPolicy::BackupAndReset;
        config.save(temp.path()).unwrap();

        let loaded = WorkflowConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.transition_policy, TransitionPolicy::Permissive);
        assert_eq!(loaded.on_corrupt_ledger, CorruptLedgerPolicy::BackupAndReset);
        assert_eq!(loaded.state_dirs, config.state_dirs);
    }

    #[test]
    fn test_partial_toml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "transition_policy = \"permissive\"\n\n[state_dirs]\npending = \"inbox\"\n",
        )
        .unwrap();

        let config = WorkflowConfig::load(temp.path()).unwrap();
        let layout = config.layout(temp.path()).unwrap();

        assert_eq!(
            layout.state_dirs.dir_for(WorkflowState::Pending),
            Some(temp.path().join("inbox").as_path())
        );
        assert_eq!(layout.state_dirs.dir_for(WorkflowState::Processing), None);
    }

    #[test]
    fn test_artifact_state_directory_rejected() {
        let mut config = WorkflowConfig::default();
        config
            .state_dirs
            .insert("extracted".to_string(), PathBuf::from("workflows/extracted"));

        let err = config.layout(Path::new("/base")).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_state_name_rejected() {
        let mut config = WorkflowConfig::default();
        config.state_dirs.insert("archived".to_string(), PathBuf::from("x"));
        assert!(config.layout(Path::new("/base")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WorkflowConfig::default();
        config.apply_env_overrides(|key| match key {
            "GRANTFLOW_BATCH_LIMIT" => Some("3".to_string()),
            "GRANTFLOW_MAX_FILE_SIZE_MB" => Some("not-a-number".to_string()),
            "GRANTFLOW_AI_MODEL" => Some(" gpt-4o ".to_string()),
            _ => None,
        });

        assert_eq!(config.batch_limit, 3);
        assert_eq!(config.max_file_size_mb, 50);
        assert_eq!(config.ai_model, "gpt-4o");
    }
}
