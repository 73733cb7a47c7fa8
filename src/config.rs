use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub delivery: DeliveryConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    /// Seconds to wait for the worker to finish after a shutdown signal
    #[arg(long, env = "COURIER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sweep on a fixed interval until interrupted
    #[default]
    Watch,
    /// Run a single sweep and exit (non-zero exit code on failure)
    Once,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "COURIER_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long = "db-max-connections", env = "COURIER_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long = "db-min-connections", env = "COURIER_DB_MIN_CONNECTIONS", default_value_t = 0)]
    pub min_connections: u32,

    /// How long to wait for a free connection
    #[arg(long = "db-acquire-timeout-secs", env = "COURIER_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Connection attempts at startup before giving up
    #[arg(long = "db-connect-attempts", env = "COURIER_DB_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub connect_attempts: usize,

    /// Upper bound on the delay between startup connection attempts
    #[arg(long = "db-max-backoff-secs", env = "COURIER_DB_MAX_BACKOFF_SECS", default_value_t = 10)]
    pub max_backoff_secs: u64,
}

/// What happens to posts whose delivery time slipped out of the lookback window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MissedPolicy {
    /// Leave them undelivered and report how many are stranded
    #[default]
    Abandon,
    /// Ignore the window's lower bound and deliver them late
    Deliver,
}

#[derive(Clone, Debug, Args)]
pub struct DeliveryConfig {
    /// How often to sweep for due posts (0 disables the worker)
    #[arg(long, env = "COURIER_POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// How far back a sweep looks for posts that became due
    #[arg(long, env = "COURIER_LOOKBACK_SECS", default_value_t = 600)]
    pub lookback_secs: u64,

    /// Handling of posts older than the lookback window
    #[arg(long, env = "COURIER_MISSED_POLICY", value_enum, default_value_t = MissedPolicy::Abandon)]
    pub missed_policy: MissedPolicy,

    /// Maximum number of posts delivered in a single sweep
    #[arg(
        long,
        env = "COURIER_BATCH_LIMIT",
        default_value_t = 500,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub batch_limit: i64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 60, lookback_secs: 600, missed_policy: MissedPolicy::Abandon, batch_limit: 500 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP/HTTP collector base URL; traces and metrics are exported only when set
    #[arg(long, env = "COURIER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
