//! Typed error type for the db crate.
//!
//! Callers above the repository layer (the `PgStore` adapter) fold these into
//! the storage error taxonomy; nothing here knows about workflow semantics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A lookup by key matched no row.
    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
