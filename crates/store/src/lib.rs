//! `store` crate — workflow records and the storage contracts behind them.
//!
//! Every backend (the Postgres adapter in `engine`, the in-memory
//! [`MemoryStore`]) implements [`ItemStore`] and [`AuditLog`]. The workflow
//! service only ever talks to these traits.

pub mod error;
pub mod memory;
pub mod models;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{
    ActorId, NewItem, NewTransition, Scope, Status, TransitionRecord, WorkflowItem, WorkflowKind,
};
pub use traits::{AuditLog, ItemStore};
