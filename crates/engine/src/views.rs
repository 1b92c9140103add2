//! Read-side projections. Nothing here writes to either store.

use std::sync::Arc;

use serde::Serialize;
use store::{AuditLog, ItemStore, Scope, Status, TransitionRecord, WorkflowItem, WorkflowKind};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::models::Actor;
use crate::WorkflowError;

/// Listing scope for `actor`: reviewers see every item of `kind`, everyone
/// else only their own.
pub fn scope_for_actor(actor: &Actor, kind: WorkflowKind) -> Scope {
    Scope {
        kind: Some(kind),
        owner: (!actor.role.can_review(kind)).then_some(actor.id),
    }
}

/// A point-in-time snapshot returned by [`QueryViews::list_by_status`].
///
/// Holds no cursor; query again for a fresh snapshot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Listing {
    items: Vec<WorkflowItem>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WorkflowItem> {
        self.items.iter()
    }
}

impl IntoIterator for Listing {
    type Item = WorkflowItem;
    type IntoIter = std::vec::IntoIter<WorkflowItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Consistency report for one item, produced by [`QueryViews::verify`].
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub item: WorkflowItem,
    pub records: Vec<TransitionRecord>,
}

/// Query entry points over the item store and the audit log.
#[derive(Clone)]
pub struct QueryViews {
    items: Arc<dyn ItemStore>,
    log: Arc<dyn AuditLog>,
}

impl QueryViews {
    pub fn new(items: Arc<dyn ItemStore>, log: Arc<dyn AuditLog>) -> Self {
        Self { items, log }
    }

    /// Items in `status` visible under `scope`, most recently transitioned first.
    pub async fn list_by_status(
        &self,
        status: Status,
        scope: Scope,
    ) -> Result<Listing, WorkflowError> {
        let items = self.items.list_by_status(status, scope).await?;
        Ok(Listing { items })
    }

    /// An item's transitions, oldest first.
    ///
    /// # Errors
    /// `CorruptHistory` if the records do not form one unbroken chain starting
    /// at the item's initial status.
    #[instrument(skip(self))]
    pub async fn history(&self, item_id: Uuid) -> Result<Vec<TransitionRecord>, WorkflowError> {
        let item = self.items.get(item_id).await?;
        let records = self.log.list_for_item(item_id).await?;
        check_chain(&item, &records).map_err(|detail| corrupt(item_id, detail))?;
        Ok(records)
    }

    /// Check the chain and that it ends where the item currently is.
    ///
    /// This is what catches a transition whose audit append never landed.
    #[instrument(skip(self))]
    pub async fn verify(&self, item_id: Uuid) -> Result<HistoryReport, WorkflowError> {
        let item = self.items.get(item_id).await?;
        let records = self.log.list_for_item(item_id).await?;
        check_chain(&item, &records).map_err(|detail| corrupt(item_id, detail))?;

        let tail = records.last().map_or(item.initial_status, |r| r.to_status);
        if tail != item.status {
            return Err(corrupt(
                item_id,
                format!("history ends in '{tail}' but the item is '{}'", item.status),
            ));
        }
        if records.len() as i64 != item.version {
            return Err(corrupt(
                item_id,
                format!("{} records for an item at version {}", records.len(), item.version),
            ));
        }

        Ok(HistoryReport { item, records })
    }
}

fn corrupt(item_id: Uuid, detail: String) -> WorkflowError {
    error!("history of item {} is corrupt: {}", item_id, detail);
    WorkflowError::CorruptHistory { item_id, detail }
}

/// Walk the records and confirm each one picks up where the last left off.
fn check_chain(item: &WorkflowItem, records: &[TransitionRecord]) -> Result<(), String> {
    let mut expected_from = item.initial_status;

    for (position, record) in records.iter().enumerate() {
        let expected_seq = position as i64 + 1;
        if record.item_id != item.id {
            return Err(format!("record {} belongs to item {}", record.id, record.item_id));
        }
        if record.seq != expected_seq {
            return Err(format!(
                "record {} has seq {}, expected {}",
                record.id, record.seq, expected_seq
            ));
        }
        if record.from_status != expected_from {
            return Err(format!(
                "record {} starts from '{}' but the previous state was '{}'",
                record.id, record.from_status, expected_from
            ));
        }
        expected_from = record.to_status;
    }

    Ok(())
}
