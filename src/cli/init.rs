use crate::ledger::LedgerMap;
use crate::models::config::CONFIG_FILE;
use crate::models::WorkflowConfig;
use crate::Result;
use colored::Colorize;
use std::path::Path;

use super::Workspace;

pub fn run(base: &Path) -> Result<()> {
    let config_path = base.join(CONFIG_FILE);
    if config_path.exists() {
        println!(
            "{}",
            format!("⚠️  {} already exists, keeping it", config_path.display()).yellow()
        );
    } else {
        WorkflowConfig::default().save(base)?;
        println!("   ✓ {}", CONFIG_FILE);
    }

    let workspace = Workspace::open(base)?;
    println!("{}", "📁 Creating directory structure...".cyan());
    workspace.layout.ensure_directories()?;
    for (state, dir) in workspace.layout.state_dirs.iter() {
        println!("   ✓ {} ({})", dir.display(), state);
    }
    println!("   ✓ {} (artifacts)", workspace.layout.results_dir.display());
    println!("   ✓ {} (processed)", workspace.layout.processed_dir.display());

    let ledger = workspace.machine.ledger();
    if !ledger.path().exists() {
        ledger.save(&LedgerMap::new())?;
    }
    println!("   ✓ {} (ledger)", ledger.path().display());

    println!();
    println!("{}", "✨ Workflow initialized".green().bold());
    Ok(())
}
