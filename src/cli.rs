//! Subcommand runners: wiring for the orchestrator role and shared
//! logging bootstrap.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use abacus::auth::JwtManager;
use abacus::config::{LogConfig, OrchestratorConfig};
use abacus::db::Database;
use abacus::service::{Accounts, Scheduler};
use abacus::{dispatch, http};

/// How often the connection monitor pings the database.
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Initialize tracing: stderr always, plus a file layer when enabled.
/// The returned guard must be held for the process lifetime so buffered
/// file output is flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("unknown log level: {}", config.level))?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.enable_file_logging {
        let dir = config
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        std::fs::create_dir_all(dir).context("failed to create log directory")?;
        let file_name = config
            .path
            .file_name()
            .context("LOG_PATH must name a file")?;

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        Ok(None)
    }
}

/// Run the orchestrator: connect and migrate the store, start the
/// connection monitor and expiry sweep, then serve HTTP and gRPC until
/// either exits or the process receives an interrupt.
pub async fn run_orchestrator(config: OrchestratorConfig) -> Result<()> {
    let db = Database::connect(&config.postgres.url())
        .await
        .context("failed to connect to database")?;
    let monitor = db.start_monitoring(MONITOR_INTERVAL);

    db.run_migrations(&config.migration_dir)
        .await
        .context("failed to run migrations")?;

    let jwt = JwtManager::new(config.jwt_secret.as_bytes(), config.jwt_ttl);
    let scheduler = Scheduler::new(db.clone(), config.operation_times);
    let sweep =
        scheduler.start_expired_task_reset(config.reset_interval, config.expiration_delay);

    let accounts = Accounts::new(db, jwt.clone());
    let state = http::AppState::new(accounts, Arc::clone(&scheduler), jwt);

    let grpc_addr: SocketAddr = format!("{}:{}", config.grpc_host, config.grpc_port)
        .parse()
        .context("invalid gRPC listen address")?;

    info!("starting orchestrator");
    let result = tokio::select! {
        r = http::run(state, &config.http_host, config.http_port) => r,
        r = dispatch::serve(scheduler, grpc_addr) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };

    sweep.abort();
    monitor.abort();
    result
}
