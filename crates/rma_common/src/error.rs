//! Workflow error taxonomy
//!
//! Four case-level kinds the API surfaces, plus a store kind for
//! infrastructure failures. Notifier failures never appear here; dispatch
//! logs them and moves on.

use crate::case::RmaStage;

/// Typed failure returned by every workflow operation
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// Missing or malformed required field; caller can correct and retry
    #[error("validation failed: {0}")]
    Validation(String),

    /// Stage change not permitted from the current stage; case untouched
    #[error("{action} is not allowed while the case is in {stage}")]
    InvalidTransition { stage: RmaStage, action: &'static str },

    /// Stale version supplied; caller must re-read and retry
    #[error("version conflict: expected {expected}, case is at {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// No case with the given id
    #[error("case not found: {0}")]
    NotFound(String),

    /// Case store unavailable or misbehaving; not caller-correctable
    #[error("store failure: {0}")]
    Store(String),
}

impl WorkflowError {
    /// Field-is-required helper used by the transition validators
    pub fn required(field: &str) -> Self {
        WorkflowError::Validation(format!("{} is required", field))
    }

    /// Stable token for wire error bodies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Store(_) => "store",
        }
    }
}
