use crate::models::{DocumentRecord, WorkflowState};
use crate::Result;
use colored::Colorize;
use std::path::Path;

use super::{state_label, Workspace};

pub fn run(base: &Path, state: Option<WorkflowState>) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let ledger = workspace.machine.ledger();

    let records: Vec<DocumentRecord> = match state {
        Some(state) => ledger.query_by_state(state)?,
        None => {
            let mut all = Vec::new();
            for state in WorkflowState::ALL {
                all.extend(ledger.query_by_state(state)?);
            }
            all
        }
    };

    match state {
        Some(state) => println!(
            "{}",
            format!("📋 Documents in {}:", state).cyan()
        ),
        None => println!("{}", "📋 All documents:".cyan()),
    }

    if records.is_empty() {
        println!("{}", "   (none)".bright_black());
        return Ok(());
    }

    for record in records {
        print!(
            "   • {} [{}] {}",
            record.filename,
            state_label(record.current_state),
            record.created_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
        );
        match &record.error_message {
            Some(message) => println!(" {}", message.red()),
            None => println!(),
        }
    }
    Ok(())
}
