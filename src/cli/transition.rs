use crate::models::WorkflowState;
use crate::Result;
use colored::Colorize;
use std::path::Path;

use super::{state_label, Workspace};

/// Record a new state without touching files
pub fn run(
    base: &Path,
    filename: &str,
    state: WorkflowState,
    message: Option<&str>,
) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let record = workspace.machine.transition(filename, state, message)?;

    println!(
        "{}",
        format!("✓ {} → {}", record.filename, state_label(record.current_state)).green()
    );
    if let Some(message) = &record.error_message {
        println!("  Error: {}", message);
    }
    Ok(())
}

/// Move the source file between state directories and transition
pub fn run_move(
    base: &Path,
    filename: &str,
    from: WorkflowState,
    to: WorkflowState,
) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let record = workspace.machine.move_document(filename, from, to)?;

    println!(
        "{}",
        format!("✓ Moved {} from {} to {}", record.filename, from, to).green()
    );
    Ok(())
}
