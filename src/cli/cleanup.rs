use crate::Result;
use colored::Colorize;
use std::path::Path;

use super::Workspace;

pub fn run(base: &Path) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let recovered = workspace.machine.cleanup_errors()?;

    if recovered.is_empty() {
        println!("{}", "No documents in error state".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("🔄 Moved {} document(s) back to pending:", recovered.len()).cyan()
    );
    for filename in recovered {
        println!("   • {}", filename);
    }
    Ok(())
}
