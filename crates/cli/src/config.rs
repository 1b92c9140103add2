//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable so the binary can be
//! configured the same way under a process manager or a container.

use std::time::Duration;

use clap::Args;
use db::pool::PoolSettings;
use engine::ServiceConfig;

/// Database connection settings shared by every sub-command that needs one.
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Pool ceiling. One-shot commands never need more than two.
    #[arg(long, env = "VIDPOD_MAX_CONNECTIONS", default_value_t = 2)]
    pub max_connections: u32,

    #[arg(long, env = "VIDPOD_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

impl DbArgs {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

/// Workflow service tuning.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Re-read/re-validate attempts after a lost compare-and-swap.
    #[arg(long, env = "VIDPOD_CAS_RETRIES", default_value_t = 1)]
    pub cas_retries: u32,
}

impl From<&ServiceArgs> for ServiceConfig {
    fn from(args: &ServiceArgs) -> Self {
        ServiceConfig {
            cas_retries: args.cas_retries,
        }
    }
}
