//! `api` crate — HTTP REST API layer over the workflow service.
//!
//! Exposes:
//!   POST   /api/v1/items
//!   GET    /api/v1/items?status=pending&kind=story_idea
//!   GET    /api/v1/items/:id
//!   GET    /api/v1/items/:id/history
//!   POST   /api/v1/items/:id/:action      (submit | approve | reject | resubmit)

pub mod auth;
pub mod error;
pub mod notify;

pub mod handlers {
    pub mod items;

    pub use super::AppState;
}

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use engine::WorkflowService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::notify::Notifier;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: WorkflowService,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(service: WorkflowService, notifier: Arc<dyn Notifier>) -> Self {
        Self { service, notifier }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/items",
            post(handlers::items::create).get(handlers::items::list),
        )
        .route("/api/v1/items/:id", get(handlers::items::get))
        .route("/api/v1/items/:id/history", get(handlers::items::history))
        .route("/api/v1/items/:id/:action", post(handlers::items::transition))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
