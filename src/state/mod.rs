//! Workflow state machine
//!
//! Applies lifecycle transitions to ledger records:
//! - Transition whitelist (or permissive mode)
//! - File relocation between state directories
//! - Error recovery back to pending

mod machine;

pub use machine::{is_whitelisted, Relocation, StateMachine};
