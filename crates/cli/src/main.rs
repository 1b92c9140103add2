//! `vidpod-workflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the API server.
//! - `migrate`: run pending database migrations.
//! - `verify`: check that an item's audit trail matches its current status.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use api::notify::LogNotifier;
use db::pool::PoolSettings;
use engine::{PgStore, ServiceConfig, WorkflowService};
use store::MemoryStore;

use crate::config::{DbArgs, ServiceArgs};

#[derive(Parser)]
#[command(
    name = "vidpod-workflow",
    about = "Approval workflow service for story ideas and teacher requests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "VIDPOD_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        /// Keep everything in process memory instead of Postgres (demos only).
        #[arg(long)]
        in_memory: bool,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        #[arg(long, env = "VIDPOD_MAX_CONNECTIONS", default_value_t = 10)]
        max_connections: u32,
        #[arg(long, env = "VIDPOD_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
        acquire_timeout_secs: u64,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[command(flatten)]
        database: DbArgs,
    },
    /// Check one item's history against its current status.
    Verify {
        item_id: Uuid,
        #[command(flatten)]
        database: DbArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            in_memory,
            database_url,
            max_connections,
            acquire_timeout_secs,
            service,
        } => {
            let config = ServiceConfig::from(&service);
            let workflow = if in_memory {
                info!("Using in-memory store; data is lost on exit");
                WorkflowService::with_store(Arc::new(MemoryStore::new()), config)
            } else {
                let url = database_url
                    .context("DATABASE_URL is required unless --in-memory is given")?;
                let settings = PoolSettings {
                    database_url: url,
                    max_connections,
                    acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                };
                let pool = db::pool::create_pool(&settings)
                    .await
                    .context("failed to connect to database")?;
                db::pool::ping(&pool).await.context("database health check failed")?;
                WorkflowService::with_store(Arc::new(PgStore::new(pool)), config)
            };

            info!("Starting API server on {bind}");
            let state = api::AppState::new(workflow, Arc::new(LogNotifier));
            api::serve(&bind, state).await.context("API server failed")?;
        }
        Command::Migrate { database } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database.pool_settings())
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Verify { item_id, database } => {
            let pool = db::pool::create_pool(&database.pool_settings())
                .await
                .context("failed to connect to database")?;
            let workflow =
                WorkflowService::with_store(Arc::new(PgStore::new(pool)), ServiceConfig::default());

            match workflow.views().verify(item_id).await {
                Ok(report) => {
                    println!(
                        "✅ Item {} is '{}' with {} consistent transition(s).",
                        report.item.id,
                        report.item.status,
                        report.records.len()
                    );
                    println!("{}", serde_json::to_string_pretty(&report.records)?);
                }
                Err(e) => {
                    eprintln!("❌ Verification failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
