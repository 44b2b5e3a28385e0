use crate::error::WorkflowError;
use crate::ledger::DocumentLedger;
use crate::models::DocumentRecord;
use crate::Result;
use colored::Colorize;
use serde_json::json;
use std::path::Path;

use super::{state_label, Workspace};

/// Documents listed under recent activity
const RECENT_LIMIT: usize = 5;

pub fn run(base: &Path, filename: Option<&str>, json: bool) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let ledger = workspace.machine.ledger();

    match filename {
        Some(filename) => show_document(ledger, filename, json),
        None => show_summary(ledger, json),
    }
}

fn show_document(ledger: &DocumentLedger, filename: &str, json: bool) -> Result<()> {
    let Some(record) = ledger.get(filename)? else {
        if json {
            println!(
                "{}",
                json!({"error": "document_not_found", "filename": filename})
            );
        }
        return Err(WorkflowError::NotFound(filename.to_string()).into());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", format!("Status for: {}", record.filename).cyan().bold());
    println!();
    println!(
        "   State:    {} {}",
        record.current_state.emoji(),
        state_label(record.current_state)
    );
    println!("   Source:   {}", record.original_path);
    println!("   Created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("   Updated:  {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(message) = &record.error_message {
        println!("   Error:    {}", message.red());
    }
    if !record.metadata.is_empty() {
        println!("   Metadata:");
        for (key, value) in &record.metadata {
            println!("     {}: {}", key.bright_black(), value);
        }
    }
    Ok(())
}

/// Per-state counts and recent activity as JSON
pub fn summary_json(ledger: &DocumentLedger) -> Result<serde_json::Value> {
    let counts: serde_json::Map<String, serde_json::Value> = ledger
        .summary()?
        .into_iter()
        .map(|(state, count)| (state.to_string(), json!(count)))
        .collect();
    let recent: Vec<DocumentRecord> = ledger.recent(RECENT_LIMIT)?;

    Ok(json!({
        "total": counts.values().filter_map(|v| v.as_u64()).sum::<u64>(),
        "counts": counts,
        "recent": recent,
    }))
}

fn show_summary(ledger: &DocumentLedger, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(ledger)?)?);
        return Ok(());
    }

    let summary = ledger.summary()?;
    if summary.iter().all(|(_, count)| *count == 0) {
        println!("{}", "No documents in workflow".yellow());
        return Ok(());
    }

    println!("{}", "=== Workflow Summary ===".cyan().bold());
    for (state, count) in summary.into_iter().filter(|(_, count)| *count > 0) {
        println!("   {} {}: {} documents", state.emoji(), state_label(state), count);
    }

    let recent = ledger.recent(RECENT_LIMIT)?;
    println!();
    println!("{}", "=== Recent Activity ===".cyan().bold());
    for record in recent {
        println!(
            "   {}: {} (updated: {})",
            record.filename,
            state_label(record.current_state),
            record.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
