//! Storage-level error type.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Status, WorkflowKind};

/// Errors returned by an [`ItemStore`](crate::ItemStore) or
/// [`AuditLog`](crate::AuditLog) implementation.
///
/// The service uses the variant to decide what happens next:
/// - `Conflict`    — the CAS lost; the service re-reads and retries once.
/// - `Unavailable` — propagated unchanged, never retried.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// No item with the given id.
    #[error("item {0} not found")]
    NotFound(Uuid),

    /// The stored status or version no longer matches the expected value.
    #[error("item {item_id} changed underneath: expected {expected_status} at version {expected_version}")]
    Conflict {
        item_id: Uuid,
        expected_status: Status,
        expected_version: i64,
    },

    /// The kind does not allow this starting status.
    #[error("{kind} items cannot start in '{status}'")]
    InvalidInitialStatus { kind: WorkflowKind, status: Status },

    /// A different record already occupies this position in the item's history.
    #[error("item {item_id} already has a different transition at seq {seq}")]
    DuplicateSequence { item_id: Uuid, seq: i64 },

    /// The backend could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
