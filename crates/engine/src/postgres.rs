//! `PgStore` — the store contracts backed by the `db` repositories.

use async_trait::async_trait;
use db::models::{TransitionRow, WorkflowItemRow};
use db::repository::{items as item_repo, transitions as transition_repo};
use db::{DbError, DbPool};
use store::{
    AuditLog, ItemStore, NewItem, NewTransition, Scope, Status, StoreError, TransitionRecord,
    WorkflowItem,
};
use uuid::Uuid;

/// Postgres-backed [`ItemStore`] and [`AuditLog`].
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: DbError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn not_found_or_backend(id: Uuid) -> impl FnOnce(DbError) -> StoreError {
    move |err| match err {
        DbError::NotFound => StoreError::NotFound(id),
        other => backend(other),
    }
}

fn parse<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Unavailable(format!("unreadable row: {e}")))
}

fn item_from_row(row: WorkflowItemRow) -> Result<WorkflowItem, StoreError> {
    Ok(WorkflowItem {
        id: row.id,
        kind: parse(&row.kind)?,
        title: row.title,
        details: row.details,
        owner_actor_id: row.owner_actor_id,
        status: parse(&row.status)?,
        initial_status: parse(&row.initial_status)?,
        version: row.version,
        created_at: row.created_at,
        last_transition_at: row.last_transition_at,
    })
}

fn record_from_row(row: TransitionRow) -> Result<TransitionRecord, StoreError> {
    Ok(TransitionRecord {
        id: row.id,
        item_id: row.item_id,
        seq: row.seq,
        actor_id: row.actor_id,
        from_status: parse(&row.from_status)?,
        to_status: parse(&row.to_status)?,
        reason: row.reason,
        occurred_at: row.occurred_at,
    })
}

#[async_trait]
impl ItemStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<WorkflowItem, StoreError> {
        item_repo::get_item(&self.pool, id)
            .await
            .map_err(not_found_or_backend(id))
            .and_then(item_from_row)
    }

    async fn create(&self, item: NewItem) -> Result<WorkflowItem, StoreError> {
        if !item.kind.accepts_initial(item.initial_status) {
            return Err(StoreError::InvalidInitialStatus {
                kind: item.kind,
                status: item.initial_status,
            });
        }

        item_repo::create_item(
            &self.pool,
            item.kind.as_str(),
            &item.title,
            item.details,
            item.owner_actor_id,
            item.initial_status.as_str(),
        )
        .await
        .map_err(backend)
        .and_then(item_from_row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_status: Status,
        expected_version: i64,
        new_status: Status,
    ) -> Result<WorkflowItem, StoreError> {
        let updated = item_repo::update_item_status(
            &self.pool,
            id,
            expected_status.as_str(),
            expected_version,
            new_status.as_str(),
        )
        .await
        .map_err(backend)?;

        match updated {
            Some(row) => item_from_row(row),
            None => {
                // Zero rows matched: either the item is gone or someone moved it.
                item_repo::get_item(&self.pool, id)
                    .await
                    .map_err(not_found_or_backend(id))?;
                Err(StoreError::Conflict {
                    item_id: id,
                    expected_status,
                    expected_version,
                })
            }
        }
    }

    async fn list_by_status(
        &self,
        status: Status,
        scope: Scope,
    ) -> Result<Vec<WorkflowItem>, StoreError> {
        item_repo::list_items_by_status(
            &self.pool,
            status.as_str(),
            scope.kind.map(|k| k.as_str()),
            scope.owner,
        )
        .await
        .map_err(backend)?
        .into_iter()
        .map(item_from_row)
        .collect()
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn append(&self, transition: NewTransition) -> Result<TransitionRecord, StoreError> {
        let inserted = transition_repo::insert_transition(
            &self.pool,
            transition.item_id,
            transition.seq,
            transition.actor_id,
            transition.from_status.as_str(),
            transition.to_status.as_str(),
            transition.reason.as_deref(),
            transition.occurred_at,
        )
        .await
        .map_err(backend)?;

        if let Some(row) = inserted {
            return record_from_row(row);
        }

        let existing = transition_repo::get_transition(&self.pool, transition.item_id, transition.seq)
            .await
            .map_err(backend)
            .and_then(record_from_row)?;

        if transition.matches(&existing) {
            Ok(existing)
        } else {
            Err(StoreError::DuplicateSequence {
                item_id: transition.item_id,
                seq: transition.seq,
            })
        }
    }

    async fn list_for_item(&self, item_id: Uuid) -> Result<Vec<TransitionRecord>, StoreError> {
        transition_repo::list_transitions_for_item(&self.pool, item_id)
            .await
            .map_err(backend)?
            .into_iter()
            .map(record_from_row)
            .collect()
    }
}
