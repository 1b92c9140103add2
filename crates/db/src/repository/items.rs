//! Workflow item snapshot operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowItemRow};

const ITEM_COLUMNS: &str = "id, kind, title, details, owner_actor_id, status, initial_status, \
                            version, created_at, last_transition_at";

/// Insert a new item at version 0 in `initial_status`.
pub async fn create_item(
    pool: &PgPool,
    kind: &str,
    title: &str,
    details: serde_json::Value,
    owner_actor_id: i64,
    initial_status: &str,
) -> Result<WorkflowItemRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowItemRow>(&format!(
        r#"
        INSERT INTO workflow_items
            (id, kind, title, details, owner_actor_id, status, initial_status, version,
             created_at, last_transition_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6, 0, $7, $7)
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(kind)
    .bind(title)
    .bind(details)
    .bind(owner_actor_id)
    .bind(initial_status)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single item by its primary key.
pub async fn get_item(pool: &PgPool, id: Uuid) -> Result<WorkflowItemRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM workflow_items WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Conditionally move an item to `new_status`.
///
/// The `WHERE` clause pins both the status and the version, so the row is
/// only written if nobody else transitioned it since it was read. Returns
/// `None` when zero rows matched (lost race or missing item).
pub async fn update_item_status(
    pool: &PgPool,
    id: Uuid,
    expected_status: &str,
    expected_version: i64,
    new_status: &str,
) -> Result<Option<WorkflowItemRow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowItemRow>(&format!(
        r#"
        UPDATE workflow_items
        SET status = $1,
            version = version + 1,
            last_transition_at = GREATEST($2, created_at)
        WHERE id = $3 AND status = $4 AND version = $5
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(new_status)
    .bind(Utc::now())
    .bind(id)
    .bind(expected_status)
    .bind(expected_version)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return items in `status`, newest transition first.
///
/// `kind` and `owner_actor_id` narrow the result when given.
pub async fn list_items_by_status(
    pool: &PgPool,
    status: &str,
    kind: Option<&str>,
    owner_actor_id: Option<i64>,
) -> Result<Vec<WorkflowItemRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowItemRow>(&format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM workflow_items
        WHERE status = $1
          AND ($2::text IS NULL OR kind = $2)
          AND ($3::bigint IS NULL OR owner_actor_id = $3)
        ORDER BY last_transition_at DESC, id
        "#
    ))
    .bind(status)
    .bind(kind)
    .bind(owner_actor_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
