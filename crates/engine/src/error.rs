//! Engine-level error types.

use store::{NewTransition, Status, StoreError, WorkflowItem};
use thiserror::Error;
use uuid::Uuid;

use crate::validator::Rejection;

/// Errors produced by the workflow service and query views.
#[derive(Debug, Error)]
pub enum WorkflowError {
    // ------ Expected, caller-recoverable outcomes ------

    #[error("item {0} not found")]
    NotFound(Uuid),

    /// The validator refused the transition.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The create request itself is malformed.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// Another transition won the race and the retry budget is spent.
    #[error("item {item_id} was modified concurrently (now '{current}' after {attempts} attempts)")]
    ConcurrentModification {
        item_id: Uuid,
        current: Status,
        attempts: u32,
    },

    // ------ Audit trail may not match current state ------

    /// The status changed but the audit record could not be written.
    ///
    /// `pending` is the record that should exist; pass it to
    /// [`WorkflowService::record_transition`](crate::WorkflowService::record_transition)
    /// to repair.
    #[error("item {} moved to '{}' but its audit record was not written: {source}", item.id, item.status)]
    PartialFailure {
        item: Box<WorkflowItem>,
        pending: Box<NewTransition>,
        source: StoreError,
    },

    /// The stored history does not form an unbroken chain.
    #[error("history of item {item_id} is corrupt: {detail}")]
    CorruptHistory { item_id: Uuid, detail: String },

    // ------ Infrastructure ------

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WorkflowError {
    /// Whether this error means the audit trail may disagree with current
    /// state and an operator should look.
    pub fn needs_operator(&self) -> bool {
        matches!(self, Self::PartialFailure { .. } | Self::CorruptHistory { .. })
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { item_id, expected_status, .. } => Self::ConcurrentModification {
                item_id,
                current: expected_status,
                attempts: 1,
            },
            StoreError::InvalidInitialStatus { .. } => Self::InvalidItem(err.to_string()),
            StoreError::DuplicateSequence { item_id, .. } => Self::CorruptHistory {
                item_id,
                detail: err.to_string(),
            },
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
