pub mod config;
pub mod document;
pub mod extraction;
pub mod validation;

pub use config::{
    CorruptLedgerPolicy, StateDirectories, TransitionPolicy, WorkflowConfig, WorkflowLayout,
};
pub use document::{DocumentRecord, WorkflowState};
pub use extraction::{
    Budget, ConfidenceLevel, ConfidenceParse, ExtractedField, ExtractionMetadata,
    ExtractionResult, FieldValue, Presence, ProjectInfo, TeamMember, Timeline,
};
pub use validation::ValidationFlags;
