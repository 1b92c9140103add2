//! HTTP error type: maps workflow errors onto status codes and JSON bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::{Rejection, WorkflowError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Caller identity headers missing or malformed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Caller may not read this item.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UnknownAction(_) => StatusCode::NOT_FOUND,
            Self::Workflow(err) => match err {
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::Rejected(Rejection::ForbiddenActor { .. }) => StatusCode::FORBIDDEN,
                WorkflowError::Rejected(_) | WorkflowError::InvalidItem(_) => StatusCode::BAD_REQUEST,
                WorkflowError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                WorkflowError::PartialFailure { .. }
                | WorkflowError::CorruptHistory { .. }
                | WorkflowError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::UnknownAction(_) => "unknown_action",
            Self::Workflow(err) => match err {
                WorkflowError::NotFound(_) => "not_found",
                WorkflowError::Rejected(Rejection::ForbiddenActor { .. }) => "forbidden_actor",
                WorkflowError::Rejected(Rejection::IllegalTransition { .. }) => "illegal_transition",
                WorkflowError::Rejected(Rejection::MissingReason { .. }) => "missing_reason",
                WorkflowError::Rejected(Rejection::NoOp { .. }) => "no_op",
                WorkflowError::InvalidItem(_) => "invalid_item",
                WorkflowError::ConcurrentModification { .. } => "concurrent_modification",
                WorkflowError::PartialFailure { .. } => "partial_failure",
                WorkflowError::CorruptHistory { .. } => "corrupt_history",
                WorkflowError::StoreUnavailable(_) => "store_unavailable",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        // Give operators what they need to reconcile the audit trail.
        if let Self::Workflow(WorkflowError::PartialFailure { item, pending, .. }) = &self {
            body["item"] = json!(item);
            body["unrecorded_transition"] = json!(pending);
        }

        (status, Json(body)).into_response()
    }
}
