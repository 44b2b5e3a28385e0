#[cfg(feature = "api-direct")]
use crate::collaborator::OpenAiExtractor;
use crate::collaborator::{DocumentExtractor, FieldExtractor, SimulatedExtractor};
use crate::models::WorkflowConfig;
use crate::pipeline::{Pipeline, ProcessOutcome};
use crate::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use super::Workspace;

type CliPipeline = Pipeline<DocumentExtractor, Box<dyn FieldExtractor>>;

/// The model API when built with `api-direct` and a key is set, otherwise the
/// simulated response
fn field_extractor(config: &WorkflowConfig) -> Result<Box<dyn FieldExtractor>> {
    #[cfg(feature = "api-direct")]
    {
        if let Some(extractor) = OpenAiExtractor::from_env(&config.ai_model)? {
            return Ok(Box::new(extractor));
        }
    }

    tracing::warn!(
        model = %config.ai_model,
        "no model API available, using simulated extraction"
    );
    Ok(Box::new(SimulatedExtractor::new()))
}

fn pipeline(workspace: Workspace, field_extractor: Box<dyn FieldExtractor>) -> CliPipeline {
    Pipeline::new(
        workspace.machine,
        workspace.layout.results_dir,
        DocumentExtractor::new(workspace.config.max_file_size_mb),
        field_extractor,
    )
}

fn extraction_pipeline(workspace: Workspace) -> Result<CliPipeline> {
    let field_extractor = field_extractor(&workspace.config)?;
    Ok(pipeline(workspace, field_extractor))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .map(|s| s.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "))
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Move pending documents into processing
pub fn run_claim(base: &Path, limit: Option<usize>) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let limit = limit.unwrap_or(workspace.config.batch_limit);
    // claiming never reaches the field extractor
    let outcomes = pipeline(workspace, Box::new(SimulatedExtractor::new())).claim_pending(limit)?;

    if outcomes.is_empty() {
        println!("{}", "No pending documents".yellow());
        return Ok(());
    }

    for outcome in &outcomes {
        match &outcome.result {
            Ok(()) => println!("   {} {} → processing", "✓".green(), outcome.filename),
            Err(message) => println!("   {} {}: {}", "✗".red(), outcome.filename, message),
        }
    }
    let claimed = outcomes.iter().filter(|o| o.is_success()).count();
    println!();
    println!(
        "{}",
        format!("Claimed {} of {} document(s)", claimed, outcomes.len()).cyan()
    );
    Ok(())
}

/// Run extraction over documents in processing
pub fn run_process(base: &Path, limit: Option<usize>) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let limit = limit.unwrap_or(workspace.config.batch_limit);
    let pipeline = extraction_pipeline(workspace)?;

    let pb = spinner();
    let outcomes = pipeline.process_batch_with(limit, |filename| {
        pb.set_message(format!("Extracting {}...", filename));
    });
    pb.finish_and_clear();
    let outcomes = outcomes?;

    if outcomes.is_empty() {
        println!("{}", "No documents in processing state".yellow());
        return Ok(());
    }

    print_outcomes(&outcomes);
    Ok(())
}

fn print_outcomes(outcomes: &[ProcessOutcome]) {
    let successful = outcomes.iter().filter(|o| o.is_success()).count();

    println!("{}", "=== Processing Summary ===".cyan().bold());
    println!("   Total processed: {}", outcomes.len());
    println!("   Successful: {}", successful.to_string().green());
    println!("   Failed: {}", (outcomes.len() - successful).to_string().red());
    println!();

    for outcome in outcomes {
        match &outcome.result {
            Ok(extracted) => {
                let review = if extracted.needs_human_review {
                    " (needs review)".yellow()
                } else {
                    "".normal()
                };
                println!(
                    "   {} {}: {}{}",
                    "✓".green(),
                    outcome.filename,
                    extracted.artifact.display(),
                    review
                );
                for issue in &extracted.issues {
                    println!("      {} {}", "⚠".yellow(), issue);
                }
            }
            Err(message) => println!("   {} {}: {}", "✗".red(), outcome.filename, message),
        }
    }
}

/// Extract a single file outside the workflow and print or save the result
pub fn run_extract(base: &Path, path: &Path, output: Option<&Path>) -> Result<()> {
    let workspace = Workspace::open(base)?;
    let pipeline = extraction_pipeline(workspace)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let run = pipeline
        .extract_document(path, &filename)
        .with_context(|| format!("Failed to extract {}", path.display()))?;

    for issue in &run.issues {
        eprintln!("{}", format!("⚠️  {}", issue).yellow());
    }

    let content = serde_json::to_string_pretty(&run.result)?;
    match output {
        Some(output) => {
            std::fs::write(output, content)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{}", format!("✓ Results saved to: {}", output.display()).green());
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "api-direct"))]
    #[test]
    fn test_simulated_extractor_without_model_api() {
        let config = WorkflowConfig::default();
        let extractor = field_extractor(&config).unwrap();
        assert_eq!(extractor.model_name(), SimulatedExtractor::MODEL_NAME);
    }

    #[cfg(feature = "api-direct")]
    #[test]
    fn test_model_api_extractor_uses_configured_model() {
        let extractor = OpenAiExtractor::new("sk-test", "gpt-4o").unwrap();
        let boxed: Box<dyn FieldExtractor> = Box::new(extractor);
        assert_eq!(boxed.model_name(), "gpt-4o");
    }
}
