//! Document ledger
//!
//! Durable mapping from document filename to its lifecycle record, stored as a
//! single JSON object in `workflow_status.json`.

mod store;

pub use store::{DocumentLedger, LedgerMap};
