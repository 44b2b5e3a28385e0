use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use grantflow::models::WorkflowState;
use grantflow::Result;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grantflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grant document intake and extraction workflow", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workflow base directory
    #[arg(long, global = true, env = "GRANTFLOW_BASE", default_value = ".")]
    base: PathBuf,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file, state directories and an empty ledger
    Init,

    /// Copy a document into intake and register it as pending
    Register {
        /// Document to register
        path: PathBuf,

        /// Extra metadata as key=value (repeatable)
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },

    /// Show the workflow summary, or one document's record
    Status {
        /// Document filename
        filename: Option<String>,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// List documents, oldest first
    List {
        /// Only documents in this state
        #[arg(short, long)]
        state: Option<WorkflowState>,
    },

    /// Record a new state for a document without moving files
    Transition {
        filename: String,

        /// Target state
        state: WorkflowState,

        /// Error message (kept only for the error state)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move a document's file between state directories
    Move {
        filename: String,
        from: WorkflowState,
        to: WorkflowState,
    },

    /// Claim pending documents for processing
    Claim {
        /// Maximum documents (default: batch_limit from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Extract documents in processing
    Process {
        /// Maximum documents (default: batch_limit from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Extract a single file without registering it
    Extract {
        path: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Move every errored document back to pending
    #[command(name = "cleanup-errors")]
    CleanupErrors,

    /// Re-validate a stored extraction artifact
    Validate {
        artifact: PathBuf,

        /// Output flags in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let base = cli.base.as_path();

    match cli.command {
        Commands::Init => {
            println!("{}", "🚀 Initializing grant workflow...".cyan());
            grantflow::cli::init::run(base)?;
        }

        Commands::Register { path, meta } => {
            grantflow::cli::register::run(base, &path, &meta)?;
        }

        Commands::Status { filename, json } => {
            grantflow::cli::status::run(base, filename.as_deref(), json)?;
        }

        Commands::List { state } => {
            grantflow::cli::list::run(base, state)?;
        }

        Commands::Transition {
            filename,
            state,
            message,
        } => {
            grantflow::cli::transition::run(base, &filename, state, message.as_deref())?;
        }

        Commands::Move { filename, from, to } => {
            grantflow::cli::transition::run_move(base, &filename, from, to)?;
        }

        Commands::Claim { limit } => {
            grantflow::cli::process::run_claim(base, limit)?;
        }

        Commands::Process { limit } => {
            println!("{}", "🤖 Processing documents...".cyan());
            grantflow::cli::process::run_process(base, limit)?;
        }

        Commands::Extract { path, output } => {
            grantflow::cli::process::run_extract(base, &path, output.as_deref())?;
        }

        Commands::CleanupErrors => {
            grantflow::cli::cleanup::run(base)?;
        }

        Commands::Validate { artifact, json } => {
            grantflow::cli::validate::run(&artifact, json)?;
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "grantflow", &mut io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_state_arguments_parse_case_insensitively() {
        let cli = Cli::try_parse_from(["grantflow", "move", "a.pdf", "Pending", "PROCESSING"])
            .unwrap();
        match cli.command {
            Commands::Move { from, to, .. } => {
                assert_eq!(from, WorkflowState::Pending);
                assert_eq!(to, WorkflowState::Processing);
            }
            _ => panic!("expected move"),
        }

        assert!(Cli::try_parse_from(["grantflow", "list", "--state", "archived"]).is_err());
    }
}
