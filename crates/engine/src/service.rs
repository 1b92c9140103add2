//! The workflow service — the only path that changes an item's status.
//!
//! `WorkflowService::request_transition` is the central orchestrator:
//! 1. Loads the item from the [`ItemStore`].
//! 2. Asks the validator whether the actor may apply the action.
//! 3. Compare-and-swaps the status, retrying the whole sequence up to
//!    `cas_retries` times when another writer got there first.
//! 4. Appends the [`TransitionRecord`] to the [`AuditLog`].
//! 5. Returns the updated item together with its new record.
//!
//! The service holds no locks and no per-request state; the store's CAS is
//! the single arbiter of which concurrent request wins.

use std::sync::Arc;

use store::{
    AuditLog, ItemStore, NewItem, NewTransition, Status, StoreError, TransitionRecord,
    WorkflowItem, WorkflowKind,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Action, Actor};
use crate::validator::can_transition;
use crate::views::QueryViews;
use crate::WorkflowError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How many times a lost CAS is retried (re-read, re-validate, re-write)
    /// before `ConcurrentModification` is reported.
    pub cas_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { cas_retries: 1 }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed transition
// ---------------------------------------------------------------------------

/// The result of a successful transition.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TransitionOutcome {
    pub item: WorkflowItem,
    pub record: TransitionRecord,
}

/// Input for [`WorkflowService::create`]. The owner is the creating actor.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateItem {
    pub kind: WorkflowKind,
    pub title: String,
    #[serde(default)]
    pub details: serde_json::Value,
    /// Defaults to `draft` for story ideas and `pending` for teacher requests.
    pub initial_status: Option<Status>,
}

// ---------------------------------------------------------------------------
// WorkflowService
// ---------------------------------------------------------------------------

/// Stateless orchestrator over an item store and an audit log.
///
/// Cheap to clone; construct one per process and share it.
#[derive(Clone)]
pub struct WorkflowService {
    items: Arc<dyn ItemStore>,
    log: Arc<dyn AuditLog>,
    config: ServiceConfig,
}

impl WorkflowService {
    /// Create a new service.
    pub fn new(items: Arc<dyn ItemStore>, log: Arc<dyn AuditLog>, config: ServiceConfig) -> Self {
        Self { items, log, config }
    }

    /// Build a service over one backend that implements both contracts.
    pub fn with_store<S>(store: Arc<S>, config: ServiceConfig) -> Self
    where
        S: ItemStore + AuditLog + 'static,
    {
        Self::new(store.clone(), store, config)
    }

    /// Read-only projections over the same backend.
    pub fn views(&self) -> QueryViews {
        QueryViews::new(self.items.clone(), self.log.clone())
    }

    /// Fetch one item.
    pub async fn get(&self, item_id: Uuid) -> Result<WorkflowItem, WorkflowError> {
        Ok(self.items.get(item_id).await?)
    }

    /// Create an item owned by `actor`.
    ///
    /// # Errors
    /// `InvalidItem` for a blank title or a starting status the kind does not
    /// allow; `StoreUnavailable` for backend failures.
    #[instrument(skip(self, request), fields(actor_id = actor.id, kind = %request.kind))]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateItem,
    ) -> Result<WorkflowItem, WorkflowError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(WorkflowError::InvalidItem("title must not be blank".into()));
        }

        let initial_status = request.initial_status.unwrap_or(match request.kind {
            WorkflowKind::StoryIdea => Status::Draft,
            WorkflowKind::TeacherRequest => Status::Pending,
        });

        let item = self
            .items
            .create(NewItem {
                kind: request.kind,
                title: title.to_owned(),
                details: request.details,
                owner_actor_id: actor.id,
                initial_status,
            })
            .await?;

        info!(item_id = %item.id, status = %item.status, "item created");
        Ok(item)
    }

    /// Apply `action` to an item on behalf of `actor`.
    ///
    /// # Errors
    /// - `NotFound` if the item does not exist.
    /// - `Rejected` with the validator's reason if the transition is refused.
    /// - `ConcurrentModification` if another writer won every attempt, or won
    ///   and left the item in a status where the action no longer applies.
    /// - `PartialFailure` if the status changed but the audit append failed.
    /// - `StoreUnavailable` for backend failures.
    #[instrument(skip(self, reason), fields(actor_id = actor.id, role = %actor.role))]
    pub async fn request_transition(
        &self,
        item_id: Uuid,
        actor: &Actor,
        action: Action,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let item = self.items.get(item_id).await?;

            let next = match can_transition(&item, actor, action, reason) {
                Ok(next) => next,
                // We lost a race and the winner moved the item somewhere the
                // action no longer applies.
                Err(_) if attempts > 1 => {
                    return Err(WorkflowError::ConcurrentModification {
                        item_id,
                        current: item.status,
                        attempts,
                    });
                }
                Err(rejection) => return Err(rejection.into()),
            };

            match self
                .items
                .update_status(item_id, item.status, item.version, next)
                .await
            {
                Ok(updated) => return self.log_transition(updated, actor, item.status, reason).await,

                Err(StoreError::Conflict { .. }) => {
                    if attempts > self.config.cas_retries {
                        let current = self.items.get(item_id).await?.status;
                        return Err(WorkflowError::ConcurrentModification {
                            item_id,
                            current,
                            attempts,
                        });
                    }
                    warn!(
                        "item {} changed during {} (attempt {}/{}), re-reading",
                        item_id,
                        action,
                        attempts,
                        self.config.cas_retries + 1
                    );
                }

                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Re-append a transition left behind by a `PartialFailure`.
    ///
    /// Safe to call more than once: an already-logged identical record is
    /// returned as-is.
    #[instrument(skip(self, pending), fields(item_id = %pending.item_id, seq = pending.seq))]
    pub async fn record_transition(
        &self,
        pending: NewTransition,
    ) -> Result<TransitionRecord, WorkflowError> {
        let record = self.log.append(pending).await?;
        info!("audit record {} repaired", record.id);
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Internal: write the audit record for an applied transition.
    // -----------------------------------------------------------------------

    async fn log_transition(
        &self,
        item: WorkflowItem,
        actor: &Actor,
        from_status: Status,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let pending = NewTransition {
            item_id: item.id,
            seq: item.version,
            actor_id: actor.id,
            from_status,
            to_status: item.status,
            reason: reason.map(str::to_owned),
            occurred_at: item.last_transition_at,
        };

        match self.log.append(pending.clone()).await {
            Ok(record) => {
                info!(
                    "item {} {} -> {} by actor {}",
                    item.id, from_status, item.status, actor.id
                );
                Ok(TransitionOutcome { item, record })
            }
            Err(source) => {
                error!(
                    "item {} moved {} -> {} but the audit append failed: {}",
                    item.id, from_status, item.status, source
                );
                Err(WorkflowError::PartialFailure {
                    item: Box::new(item),
                    pending: Box::new(pending),
                    source,
                })
            }
        }
    }
}
