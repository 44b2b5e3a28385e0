//! Integration tests for the document workflow
//!
//! Covers the full lifecycle through the public API:
//! - Config-driven layout and state machine construction
//! - Intake, claiming and extraction
//! - Error recording and cleanup
//! - Ledger durability across instances

use grantflow::collaborator::{load_artifact, DocumentExtractor, SimulatedExtractor};
use grantflow::models::{CorruptLedgerPolicy, TransitionPolicy};
use grantflow::pipeline::{intake_file, Pipeline, ARTIFACT_KEY};
use grantflow::{
    DocumentLedger, StateMachine, WorkflowConfig, WorkflowError, WorkflowState,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn open_machine(base: &Path) -> StateMachine {
    let config = WorkflowConfig::load(base).unwrap();
    let layout = config.layout(base).unwrap();
    layout.ensure_directories().unwrap();
    StateMachine::from_config(&config, &layout)
}

fn place_pending(base: &Path, filename: &str) {
    let dir = base.join("intake/pending");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(filename), "Grant award letter").unwrap();
}

#[test]
fn test_end_to_end_error_and_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    let machine = open_machine(base);

    place_pending(base, "a.pdf");
    machine
        .ledger()
        .register("a.pdf", "intake/pending/a.pdf", BTreeMap::new())
        .unwrap();

    let record = machine
        .move_document("a.pdf", WorkflowState::Pending, WorkflowState::Processing)
        .unwrap();
    assert_eq!(record.current_state, WorkflowState::Processing);
    assert!(base.join("intake/processing/a.pdf").exists());
    assert!(!base.join("intake/pending/a.pdf").exists());

    machine
        .transition("a.pdf", WorkflowState::Extracted, None)
        .unwrap();
    let record = machine
        .transition("a.pdf", WorkflowState::Error, Some("bad format"))
        .unwrap();
    assert_eq!(record.error_message.as_deref(), Some("bad format"));

    let recovered = machine.cleanup_errors().unwrap();
    assert_eq!(recovered, vec!["a.pdf"]);

    let record = machine.ledger().get("a.pdf").unwrap().unwrap();
    assert_eq!(record.current_state, WorkflowState::Pending);
    assert_eq!(record.error_message, None);
}

#[test]
fn test_ledger_survives_new_instances() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    open_machine(base)
        .ledger()
        .register("a.pdf", "a.pdf", BTreeMap::new())
        .unwrap();
    open_machine(base)
        .transition("a.pdf", WorkflowState::Processing, None)
        .unwrap();

    let record = open_machine(base).ledger().get("a.pdf").unwrap().unwrap();
    assert_eq!(record.current_state, WorkflowState::Processing);
    assert!(record.updated_at >= record.created_at);
}

#[test]
fn test_ledger_file_format() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    let machine = open_machine(base);
    machine
        .ledger()
        .register(
            "a.pdf",
            "intake/pending/a.pdf",
            BTreeMap::from([("source".to_string(), "email".to_string())]),
        )
        .unwrap();

    let raw = fs::read_to_string(base.join("workflows/workflow_status.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value["a.pdf"];
    assert_eq!(entry["filename"], "a.pdf");
    assert_eq!(entry["current_state"], "pending");
    assert_eq!(entry["metadata"]["source"], "email");
    assert!(entry["error_message"].is_null());
    assert!(entry["created_at"].as_str().unwrap().contains('T'));
}

#[test]
fn test_reads_ledger_written_elsewhere() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("workflow_status.json");
    fs::write(
        &path,
        r#"{
            "old.pdf": {
                "filename": "old.pdf",
                "original_path": "/uploads/old.pdf",
                "current_state": "extracted",
                "created_at": "2024-01-15T10:30:00.123456",
                "updated_at": "2024-01-15T11:00:00",
                "metadata": {"file_size_bytes": 2048, "pdf_title": null},
                "error_message": null
            }
        }"#,
    )
    .unwrap();

    let ledger = DocumentLedger::new(&path);
    let record = ledger.get("old.pdf").unwrap().unwrap();
    assert_eq!(record.current_state, WorkflowState::Extracted);
    assert_eq!(record.metadata["file_size_bytes"], "2048");
    assert!(!record.metadata.contains_key("pdf_title"));
    assert!(record.updated_at > record.created_at);
}

#[test]
fn test_corrupt_ledger_policy_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    fs::write(
        base.join("grantflow.toml"),
        "on_corrupt_ledger = \"backup-and-reset\"\ntransition_policy = \"permissive\"\n",
    )
    .unwrap();

    let config = WorkflowConfig::load(base).unwrap();
    assert_eq!(config.on_corrupt_ledger, CorruptLedgerPolicy::BackupAndReset);
    assert_eq!(config.transition_policy, TransitionPolicy::Permissive);

    let machine = open_machine(base);
    fs::write(base.join("workflows/workflow_status.json"), "{ not json").unwrap();

    machine
        .ledger()
        .register("a.pdf", "a.pdf", BTreeMap::new())
        .unwrap();
    assert_eq!(machine.ledger().load().unwrap().len(), 1);

    // permissive policy allows skipping ahead
    machine
        .transition("a.pdf", WorkflowState::Completed, None)
        .unwrap();
}

#[test]
fn test_corrupt_ledger_fails_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    let machine = open_machine(base);
    fs::write(base.join("workflows/workflow_status.json"), "[1, 2").unwrap();

    let err = machine
        .ledger()
        .register("a.pdf", "a.pdf", BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::CorruptLedger { .. }));
    assert_eq!(
        fs::read_to_string(base.join("workflows/workflow_status.json")).unwrap(),
        "[1, 2"
    );
}

#[test]
fn test_intake_claim_and_process() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    let machine = open_machine(base);

    let upload = base.join("NSF award.txt");
    fs::write(&upload, "Grant ID: SIMULATED-2024-001\nAward: $100,000").unwrap();
    let record = intake_file(&machine, &upload, 50, BTreeMap::new()).unwrap();
    let filename = record.filename.clone();

    let pipeline = Pipeline::new(
        machine,
        base.join("workflows/extracted"),
        DocumentExtractor::default(),
        SimulatedExtractor::new(),
    );

    let claimed = pipeline.claim_pending(10).unwrap();
    assert_eq!(claimed.len(), 1);
    assert!(claimed[0].is_success());

    let processed = pipeline.process_batch(10).unwrap();
    assert_eq!(processed.len(), 1);
    let extracted = processed[0].result.as_ref().unwrap();

    let record = pipeline.machine().ledger().get(&filename).unwrap().unwrap();
    assert_eq!(record.current_state, WorkflowState::Extracted);
    assert_eq!(record.metadata[ARTIFACT_KEY], extracted.artifact.display().to_string());
    assert!(base.join("intake/processed").join(&filename).exists());

    let artifact = load_artifact(&extracted.artifact).unwrap();
    assert_eq!(
        artifact.validation_flags.needs_human_review(),
        extracted.needs_human_review
    );
    assert!(artifact.validation_flags.missing_required_fields().is_empty());

    // a second run finds nothing left to do
    assert!(pipeline.process_batch(10).unwrap().is_empty());
    assert!(pipeline.claim_pending(10).unwrap().is_empty());
}

#[test]
fn test_strict_policy_rejects_skipping_ahead() {
    let temp_dir = TempDir::new().unwrap();
    let machine = open_machine(temp_dir.path());
    machine
        .ledger()
        .register("a.pdf", "a.pdf", BTreeMap::new())
        .unwrap();

    let err = machine
        .transition("a.pdf", WorkflowState::Approved, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
    assert_eq!(
        machine.ledger().get("a.pdf").unwrap().unwrap().current_state,
        WorkflowState::Pending
    );
}
