use crate::collaborator::load_artifact;
use crate::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Re-validate a stored extraction artifact and report its flags
pub fn run(path: &Path, json: bool) -> Result<()> {
    let result = load_artifact(path)
        .with_context(|| format!("Failed to load artifact {}", path.display()))?;
    let flags = &result.validation_flags;

    if json {
        println!("{}", serde_json::to_string_pretty(flags)?);
        return Ok(());
    }

    println!("{}", format!("Validation for: {}", path.display()).cyan().bold());
    if let Some(metadata) = &result.extraction_metadata {
        println!(
            "   Source: {} ({}, {})",
            metadata.source_document,
            metadata.ai_model_used,
            metadata.extraction_timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();

    if flags.is_clean() {
        println!("{}", "✅ No issues found".green());
        return Ok(());
    }

    for (category, messages) in flags.grouped() {
        if messages.is_empty() {
            continue;
        }
        println!("{}", format!("{}:", category).yellow().bold());
        for message in messages {
            println!("   • {}", message);
        }
    }

    println!();
    if flags.needs_human_review() {
        println!("{}", "⚠️  Needs human review".red().bold());
    } else {
        println!("{}", "Minor issues only, no review required".green());
    }
    Ok(())
}
