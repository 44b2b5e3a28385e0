// Grantflow - grant document intake, extraction and validation workflow
// Tracks each document's lifecycle in a JSON ledger and checks AI-extracted data

pub mod cli;
pub mod collaborator;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod validator;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use error::{WorkflowError, WorkflowResult};
pub use ledger::DocumentLedger;
pub use models::{DocumentRecord, ExtractionResult, ValidationFlags, WorkflowConfig, WorkflowState};
pub use state::StateMachine;
