pub mod cleanup;
pub mod init;
pub mod list;
pub mod process;
pub mod register;
pub mod status;
pub mod transition;
pub mod validate;

use crate::models::{WorkflowConfig, WorkflowLayout, WorkflowState};
use crate::state::StateMachine;
use crate::{Context, Result};
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};

/// Loaded configuration and state machine for one base directory
pub struct Workspace {
    pub base: PathBuf,
    pub config: WorkflowConfig,
    pub layout: WorkflowLayout,
    pub machine: StateMachine,
}

impl Workspace {
    pub fn open(base: &Path) -> Result<Self> {
        let config = WorkflowConfig::load(base)
            .with_context(|| format!("Failed to load config from {}", base.display()))?;
        let layout = config.layout(base)?;
        let machine = StateMachine::from_config(&config, &layout);

        Ok(Self {
            base: base.to_path_buf(),
            config,
            layout,
            machine,
        })
    }
}

/// State name colored by how far along (or stuck) the document is
pub fn state_label(state: WorkflowState) -> ColoredString {
    let name = state.as_str();
    match state {
        WorkflowState::Pending => name.yellow(),
        WorkflowState::Processing => name.cyan(),
        WorkflowState::Extracted | WorkflowState::Validated => name.blue(),
        WorkflowState::Approved | WorkflowState::Completed => name.green(),
        WorkflowState::Error => name.red(),
    }
}
