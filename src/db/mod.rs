//! PostgreSQL storage layer.
//!
//! The [`Database`] struct owns the `sqlx::PgPool`; all persisted state
//! mutations flow through it. Operations are split into submodules by
//! domain: [`users`] (accounts), [`expressions`] (lifecycle reads), and
//! [`tasks`] (transactional create, lease, result merge, expiry reset —
//! the scheduling core).
//!
//! Concurrency correctness comes entirely from the database: lease
//! selection locks the chosen row with `FOR UPDATE SKIP LOCKED`, and every
//! mutation runs in its own transaction. No in-memory locks exist.

mod error;
mod expressions;
mod tasks;
mod users;

pub use error::StoreError;

use std::path::Path;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

/// Timeout for the initial connection attempt at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and verify the connection with a ping.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Database { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: `SELECT 1` round-trip.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Apply all SQL migrations from `dir` in order.
    pub async fn run_migrations(&self, dir: &Path) -> anyhow::Result<()> {
        let migrator = sqlx::migrate::Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        Ok(())
    }

    /// Background connection monitor: pings every `interval` and logs
    /// transitions. The pool re-establishes broken connections on the next
    /// acquire, so a successful ping after a failure means the outage has
    /// healed; callers never see the monitor, only typed `Unavailable`
    /// errors while it lasts.
    pub fn start_monitoring(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let db = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut down = false;
            loop {
                ticker.tick().await;
                match db.health_check().await {
                    Ok(()) => {
                        if down {
                            info!("database connection restored");
                            down = false;
                        }
                    }
                    Err(e) => {
                        if !down {
                            warn!(error = %e, "database ping failed, reconnecting");
                            down = true;
                        }
                    }
                }
            }
        })
    }
}
