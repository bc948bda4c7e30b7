//! Configuration for both roles.
//!
//! Every variable is declared as a clap argument with an `env` fallback,
//! so values come from flags or the process environment (a `.env` file is
//! honored before parsing). Variables without a default are required on
//! the side that uses them and missing ones fail startup. `TIME_*_MS`
//! values are milliseconds; `JWT_TTL`, `RESET_INTERVAL`, and
//! `EXPIRATION_DELAY` are seconds.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::model::Operator;

/// Accept the usual truthy/falsey spellings for enable flags.
fn parse_enable_flag(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("not a boolean: {other}")),
    }
}

/// Logging variables shared by both roles.
#[derive(Debug, Args)]
pub struct LogArgs {
    /// Log level filter (debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    /// Log file path, used when file logging is enabled
    #[arg(long, env = "LOG_PATH", default_value = "logs.log")]
    pub log_path: PathBuf,
    /// Also write logs to LOG_PATH as JSON lines
    #[arg(
        long,
        env = "LOG_ENABLE_FILE_LOGGING",
        default_value = "false",
        action = clap::ArgAction::Set,
        value_parser = parse_enable_flag,
    )]
    pub log_enable_file_logging: bool,
}

impl LogArgs {
    fn into_config(self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            path: self.log_path,
            enable_file_logging: self.log_enable_file_logging,
        }
    }
}

/// Orchestrator-side variables.
#[derive(Debug, Args)]
pub struct OrchestratorArgs {
    /// HTTP API bind host
    #[arg(long, env = "ORCHESTRATOR_HTTP_HOST", default_value = "localhost")]
    pub http_host: String,
    /// HTTP API bind port
    #[arg(
        long,
        env = "ORCHESTRATOR_HTTP_PORT",
        default_value_t = 8080,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    pub http_port: u16,
    /// Dispatch gRPC bind host
    #[arg(long, env = "ORCHESTRATOR_GRPC_HOST")]
    pub grpc_host: String,
    /// Dispatch gRPC bind port
    #[arg(long, env = "ORCHESTRATOR_GRPC_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub grpc_port: u16,

    /// Declared duration of an addition, in milliseconds
    #[arg(
        long,
        env = "TIME_ADDITION_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub time_addition_ms: u64,
    /// Declared duration of a subtraction, in milliseconds
    #[arg(
        long,
        env = "TIME_SUBTRACTION_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub time_subtraction_ms: u64,
    /// Declared duration of a multiplication, in milliseconds
    #[arg(
        long,
        env = "TIME_MULTIPLICATIONS_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub time_multiplications_ms: u64,
    /// Declared duration of a division, in milliseconds
    #[arg(
        long,
        env = "TIME_DIVISIONS_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub time_divisions_ms: u64,

    #[arg(long, env = "POSTGRES_HOST")]
    pub postgres_host: String,
    #[arg(long, env = "POSTGRES_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub postgres_port: u16,
    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: String,
    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: String,
    #[arg(long, env = "POSTGRES_DB")]
    pub postgres_db: String,

    /// Directory of SQL migrations applied at startup
    #[arg(long, env = "MIGRATION_DIR")]
    pub migration_dir: PathBuf,

    /// Secret for signing bearer tokens
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,
    /// Token lifetime, in seconds
    #[arg(long, env = "JWT_TTL", value_parser = clap::value_parser!(u64).range(1..))]
    pub jwt_ttl: u64,
    /// Expiry sweep period, in seconds
    #[arg(long, env = "RESET_INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    pub reset_interval: u64,
    /// Grace delay past the lease deadline before the sweep reclaims it, in seconds
    #[arg(long, env = "EXPIRATION_DELAY", value_parser = clap::value_parser!(u64).range(1..))]
    pub expiration_delay: u64,

    #[command(flatten)]
    pub log: LogArgs,
}

impl OrchestratorArgs {
    pub fn into_config(self) -> OrchestratorConfig {
        OrchestratorConfig {
            http_host: self.http_host,
            http_port: self.http_port,
            grpc_host: self.grpc_host,
            grpc_port: self.grpc_port,
            operation_times: OperationTimes {
                addition: Duration::from_millis(self.time_addition_ms),
                subtraction: Duration::from_millis(self.time_subtraction_ms),
                multiplication: Duration::from_millis(self.time_multiplications_ms),
                division: Duration::from_millis(self.time_divisions_ms),
            },
            postgres: PostgresConfig {
                host: self.postgres_host,
                port: self.postgres_port,
                user: self.postgres_user,
                password: self.postgres_password,
                database: self.postgres_db,
            },
            migration_dir: self.migration_dir,
            jwt_secret: self.jwt_secret,
            jwt_ttl: Duration::from_secs(self.jwt_ttl),
            reset_interval: Duration::from_secs(self.reset_interval),
            expiration_delay: Duration::from_secs(self.expiration_delay),
            log: self.log.into_config(),
        }
    }
}

/// Agent-side variables.
#[derive(Debug, Args)]
pub struct AgentArgs {
    /// Orchestrator hostname to dial
    #[arg(long, env = "ORCHESTRATOR_HOST", default_value = "localhost")]
    pub orchestrator_host: String,
    /// Orchestrator dispatch gRPC port
    #[arg(long, env = "ORCHESTRATOR_GRPC_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub orchestrator_grpc_port: u16,
    /// Number of parallel streaming workers
    #[arg(
        long,
        env = "COMPUTING_POWER",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub computing_power: u64,

    #[command(flatten)]
    pub log: LogArgs,
}

impl AgentArgs {
    pub fn into_config(self) -> AgentConfig {
        AgentConfig {
            orchestrator_host: self.orchestrator_host,
            orchestrator_grpc_port: self.orchestrator_grpc_port,
            computing_power: self.computing_power as usize,
            log: self.log.into_config(),
        }
    }
}

/// Logging setup shared by both roles.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub path: PathBuf,
    pub enable_file_logging: bool,
}

/// PostgreSQL connection parameters.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl PostgresConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// Per-operator synthetic operation durations, written into lease deadlines.
#[derive(Debug, Clone, Copy)]
pub struct OperationTimes {
    pub addition: Duration,
    pub subtraction: Duration,
    pub multiplication: Duration,
    pub division: Duration,
}

impl OperationTimes {
    pub fn duration_for(&self, operator: Operator) -> Duration {
        match operator {
            Operator::Add => self.addition,
            Operator::Sub => self.subtraction,
            Operator::Mul => self.multiplication,
            Operator::Div => self.division,
        }
    }
}

/// Orchestrator-side configuration (HTTP + gRPC + store + policy knobs).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub http_host: String,
    pub http_port: u16,
    pub grpc_host: String,
    pub grpc_port: u16,
    pub operation_times: OperationTimes,
    pub postgres: PostgresConfig,
    pub migration_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub reset_interval: Duration,
    pub expiration_delay: Duration,
    pub log: LogConfig,
}

/// Agent-side configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub orchestrator_host: String,
    pub orchestrator_grpc_port: u16,
    pub computing_power: usize,
    pub log: LogConfig,
}
