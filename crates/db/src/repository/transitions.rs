//! Append-only transition history.
//!
//! No update or delete functions exist; the table also carries a trigger
//! rejecting both.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TransitionRow};

const TRANSITION_COLUMNS: &str =
    "id, item_id, seq, actor_id, from_status, to_status, reason, occurred_at";

/// Insert a transition record unless `(item_id, seq)` is already taken.
///
/// Returns `None` when the slot was occupied; the caller decides whether the
/// existing row is the same transition (see [`get_transition`]).
#[allow(clippy::too_many_arguments)]
pub async fn insert_transition(
    pool: &PgPool,
    item_id: Uuid,
    seq: i64,
    actor_id: i64,
    from_status: &str,
    to_status: &str,
    reason: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> Result<Option<TransitionRow>, DbError> {
    let row = sqlx::query_as::<_, TransitionRow>(&format!(
        r#"
        INSERT INTO workflow_transitions
            (item_id, seq, actor_id, from_status, to_status, reason, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (item_id, seq) DO NOTHING
        RETURNING {TRANSITION_COLUMNS}
        "#
    ))
    .bind(item_id)
    .bind(seq)
    .bind(actor_id)
    .bind(from_status)
    .bind(to_status)
    .bind(reason)
    .bind(occurred_at)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetch the record at position `seq` of an item's history.
pub async fn get_transition(
    pool: &PgPool,
    item_id: Uuid,
    seq: i64,
) -> Result<TransitionRow, DbError> {
    let row = sqlx::query_as::<_, TransitionRow>(&format!(
        "SELECT {TRANSITION_COLUMNS} FROM workflow_transitions WHERE item_id = $1 AND seq = $2"
    ))
    .bind(item_id)
    .bind(seq)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return every record for an item ordered by `seq`.
pub async fn list_transitions_for_item(
    pool: &PgPool,
    item_id: Uuid,
) -> Result<Vec<TransitionRow>, DbError> {
    let rows = sqlx::query_as::<_, TransitionRow>(&format!(
        "SELECT {TRANSITION_COLUMNS} FROM workflow_transitions WHERE item_id = $1 ORDER BY seq ASC"
    ))
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
