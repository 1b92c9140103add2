//! The storage contracts the workflow service is written against.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{NewItem, NewTransition, Scope, Status, TransitionRecord, WorkflowItem};
use crate::StoreError;

/// Durable current-state snapshots.
///
/// Implementations must be `Send + Sync` so a single store can be shared
/// across request-handling tasks.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch an item, or `StoreError::NotFound`.
    async fn get(&self, id: Uuid) -> Result<WorkflowItem, StoreError>;

    /// Insert a new item at version 0 with a fresh id.
    async fn create(&self, item: NewItem) -> Result<WorkflowItem, StoreError>;

    /// Compare-and-swap the status.
    ///
    /// Succeeds only if the stored status still equals `expected_status` and
    /// the stored version still equals `expected_version`; otherwise returns
    /// `StoreError::Conflict` and leaves the row untouched. On success the
    /// version is incremented and `last_transition_at` refreshed.
    async fn update_status(
        &self,
        id: Uuid,
        expected_status: Status,
        expected_version: i64,
        new_status: Status,
    ) -> Result<WorkflowItem, StoreError>;

    /// Items in `status` admitted by `scope`, most recently transitioned first.
    async fn list_by_status(
        &self,
        status: Status,
        scope: Scope,
    ) -> Result<Vec<WorkflowItem>, StoreError>;
}

/// Append-only transition history.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one record.
    ///
    /// Appending a transition whose `(item_id, seq)` is already logged returns
    /// the existing record when it describes the same transition, and
    /// `StoreError::DuplicateSequence` otherwise.
    async fn append(&self, transition: NewTransition) -> Result<TransitionRecord, StoreError>;

    /// All records for an item ordered by `seq`, oldest first.
    ///
    /// Not insertion order: a record repaired after a partial failure is
    /// stored after its successors.
    async fn list_for_item(&self, item_id: Uuid) -> Result<Vec<TransitionRecord>, StoreError>;
}
