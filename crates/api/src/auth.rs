//! Caller identity.
//!
//! Authentication happens upstream; the proxy forwards the verified user as
//! `X-Actor-Id` and `X-Actor-Role`. This module only parses those headers.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use engine::{Actor, Role};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extractor yielding the authenticated [`Actor`].
pub struct Caller(pub Actor);

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
    };

    let id = header(ACTOR_ID_HEADER)?
        .parse::<i64>()
        .map_err(|e| ApiError::Unauthenticated(format!("bad {ACTOR_ID_HEADER}: {e}")))?;
    let role = header(ACTOR_ROLE_HEADER)?
        .parse::<Role>()
        .map_err(ApiError::Unauthenticated)?;

    Ok(Actor::new(id, role))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Caller)
    }
}
