//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `store` crate; statuses are stored as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflow_items
// ---------------------------------------------------------------------------

/// A persisted current-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowItemRow {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub details: serde_json::Value,
    pub owner_actor_id: i64,
    pub status: String,
    pub initial_status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_transitions
// ---------------------------------------------------------------------------

/// A persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransitionRow {
    pub id: i64,
    pub item_id: Uuid,
    pub seq: i64,
    pub actor_id: i64,
    pub from_status: String,
    pub to_status: String,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
