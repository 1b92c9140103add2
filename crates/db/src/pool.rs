//! Postgres connection pool.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::DbError;

/// Type alias for the shared Postgres pool used across the whole application.
pub type DbPool = PgPool;

/// Connection settings, usually filled from CLI flags / environment.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a request waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

/// Create a new connection pool.
pub async fn create_pool(settings: &PoolSettings) -> Result<DbPool, DbError> {
    info!(
        "Connecting to database (max_connections={}, acquire_timeout={:?})",
        settings.max_connections, settings.acquire_timeout
    );
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&settings.database_url)
        .await?;
    Ok(pool)
}

/// Round-trip a trivial query and log the server version.
pub async fn ping(pool: &DbPool) -> Result<(), DbError> {
    let version: String = sqlx::query_scalar("SHOW server_version")
        .fetch_one(pool)
        .await?;
    debug!("database reachable (postgres {version})");
    Ok(())
}

/// Apply the embedded schema migrations in `./migrations` (relative to the
/// workspace root at build time). Already-applied versions are skipped.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("../../migrations");
    info!("Running database migrations ({} known)", migrator.iter().count());
    migrator.run(pool).await?;
    Ok(())
}
