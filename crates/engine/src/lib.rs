//! `engine` crate — the approval workflow: validation, the transition
//! service, read-side views, and the Postgres adapter for the store traits.

pub mod models;
pub mod error;
pub mod validator;
pub mod service;
pub mod views;
pub mod postgres;

pub use models::{Action, Actor, Role};
pub use error::WorkflowError;
pub use validator::{can_transition, Rejection};
pub use service::{CreateItem, ServiceConfig, TransitionOutcome, WorkflowService};
pub use views::{scope_for_actor, HistoryReport, Listing, QueryViews};
pub use postgres::PgStore;

#[cfg(test)]
mod service_tests;
