//! `MemoryStore` — an in-process backend for both store traits.
//!
//! Used by the engine's tests and by `serve --in-memory` for local demos.
//! It honours the same CAS and append contracts as the Postgres backend, and
//! exposes a few fault-injection knobs so tests can provoke partial failures
//! and deterministic races.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Barrier, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::models::{NewItem, NewTransition, Scope, Status, TransitionRecord, WorkflowItem};
use crate::{AuditLog, ItemStore, StoreError};

#[derive(Default)]
struct Tables {
    items: HashMap<Uuid, WorkflowItem>,
    records: Vec<TransitionRecord>,
}

/// Holds the first `remaining` readers until all of them have arrived.
struct ReadGate {
    barrier: Barrier,
    remaining: AtomicUsize,
}

/// Thread-safe in-memory store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_appends: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    read_gate: Option<Arc<ReadGate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the first `readers` calls to [`ItemStore::get`] wait for each other.
    ///
    /// Lets tests line up concurrent transitions so they all observe the same
    /// pre-transition snapshot before any of them writes.
    pub fn with_read_barrier(mut self, readers: usize) -> Self {
        self.read_gate = Some(Arc::new(ReadGate {
            barrier: Barrier::new(readers),
            remaining: AtomicUsize::new(readers),
        }));
        self
    }

    /// Fail the next `n` audit appends with `StoreError::Unavailable`.
    pub fn fail_next_appends(&self, n: usize) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    /// Toggle a simulated outage affecting every operation.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Total number of audit records across all items.
    pub async fn record_count(&self) -> usize {
        self.tables.lock().await.records.len()
    }

    /// Overwrite a stored item, bypassing every contract.
    ///
    /// Only for tests that need to fabricate drift between the snapshot and
    /// the audit trail.
    pub async fn force_item(&self, item: WorkflowItem) {
        self.tables.lock().await.items.insert(item.id, item);
    }

    /// Insert an audit record verbatim, bypassing the sequence check.
    pub async fn force_record(&self, mut record: TransitionRecord) {
        let mut tables = self.tables.lock().await;
        record.id = tables.records.len() as i64 + 1;
        tables.records.push(record);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked down".into()));
        }
        Ok(())
    }

    async fn pass_read_gate(&self) {
        let Some(gate) = &self.read_gate else { return };
        let admitted = gate
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if admitted {
            gate.barrier.wait().await;
        }
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<WorkflowItem, StoreError> {
        self.check_available()?;
        let item = self
            .tables
            .lock()
            .await
            .items
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        self.pass_read_gate().await;
        Ok(item)
    }

    async fn create(&self, item: NewItem) -> Result<WorkflowItem, StoreError> {
        self.check_available()?;
        if !item.kind.accepts_initial(item.initial_status) {
            return Err(StoreError::InvalidInitialStatus {
                kind: item.kind,
                status: item.initial_status,
            });
        }

        let now = Utc::now();
        let row = WorkflowItem {
            id: Uuid::new_v4(),
            kind: item.kind,
            title: item.title,
            details: item.details,
            owner_actor_id: item.owner_actor_id,
            status: item.initial_status,
            initial_status: item.initial_status,
            version: 0,
            created_at: now,
            last_transition_at: now,
        };

        self.tables.lock().await.items.insert(row.id, row.clone());
        debug!(item_id = %row.id, kind = %row.kind, "memory store: item created");
        Ok(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_status: Status,
        expected_version: i64,
        new_status: Status,
    ) -> Result<WorkflowItem, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let item = tables.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if item.status != expected_status || item.version != expected_version {
            return Err(StoreError::Conflict {
                item_id: id,
                expected_status,
                expected_version,
            });
        }

        item.status = new_status;
        item.version += 1;
        item.last_transition_at = Utc::now().max(item.created_at);
        Ok(item.clone())
    }

    async fn list_by_status(
        &self,
        status: Status,
        scope: Scope,
    ) -> Result<Vec<WorkflowItem>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut items: Vec<WorkflowItem> = tables
            .items
            .values()
            .filter(|i| i.status == status && scope.admits(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.last_transition_at.cmp(&a.last_transition_at));
        Ok(items)
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, transition: NewTransition) -> Result<TransitionRecord, StoreError> {
        self.check_available()?;
        let injected = self
            .failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected audit append failure".into()));
        }

        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .records
            .iter()
            .find(|r| r.item_id == transition.item_id && r.seq == transition.seq)
        {
            if transition.matches(existing) {
                return Ok(existing.clone());
            }
            return Err(StoreError::DuplicateSequence {
                item_id: transition.item_id,
                seq: transition.seq,
            });
        }

        let record = TransitionRecord {
            id: tables.records.len() as i64 + 1,
            item_id: transition.item_id,
            seq: transition.seq,
            actor_id: transition.actor_id,
            from_status: transition.from_status,
            to_status: transition.to_status,
            reason: transition.reason,
            occurred_at: transition.occurred_at,
        };
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn list_for_item(&self, item_id: Uuid) -> Result<Vec<TransitionRecord>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut records: Vec<TransitionRecord> = tables
            .records
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        // A repaired append lands after later records; seq is the real order.
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }
}
