use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use engine::{scope_for_actor, Action, Actor, CreateItem, Listing, TransitionOutcome};
use store::{Status, TransitionRecord, WorkflowItem, WorkflowKind};

use super::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Status,
    pub kind: Option<WorkflowKind>,
}

#[derive(Deserialize)]
pub struct TransitionDto {
    pub reason: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(payload): Json<CreateItem>,
) -> Result<(StatusCode, Json<WorkflowItem>), ApiError> {
    let item = state.service.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Single-item reads follow the listing scope: the owner, or a reviewer of
/// the item's kind.
fn ensure_visible(actor: &Actor, item: &WorkflowItem) -> Result<(), ApiError> {
    if scope_for_actor(actor, item.kind).admits(item) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "actor {} may not read item {}",
            actor.id, item.id
        )))
    }
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<WorkflowItem>, ApiError> {
    let item = state.service.get(id).await?;
    ensure_visible(&actor, &item)?;
    Ok(Json(item))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<Listing>, ApiError> {
    let kind = params.kind.unwrap_or(WorkflowKind::StoryIdea);
    let listing = state
        .service
        .views()
        .list_by_status(params.status, scope_for_actor(&actor, kind))
        .await?;
    Ok(Json(listing))
}

pub async fn history(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<Vec<TransitionRecord>>, ApiError> {
    let item = state.service.get(id).await?;
    ensure_visible(&actor, &item)?;
    Ok(Json(state.service.views().history(id).await?))
}

pub async fn transition(
    Path((id, action)): Path<(Uuid, String)>,
    State(state): State<AppState>,
    Caller(actor): Caller,
    payload: Option<Json<TransitionDto>>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let action: Action = action.parse().map_err(|_| ApiError::UnknownAction(action))?;
    let reason = payload.and_then(|Json(body)| body.reason);

    let outcome = state
        .service
        .request_transition(id, &actor, action, reason.as_deref())
        .await?;

    // Notification failures never undo a committed transition.
    if let Err(e) = state.notifier.transition_committed(&outcome).await {
        warn!("notifier failed for item {}: {}", outcome.item.id, e);
    }

    Ok(Json(outcome))
}
