use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the shopkeep binary.
#[derive(Debug, Parser)]
#[command(name = "shopkeep", version, about = "Users, products and orders over a cached document store")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHOPKEEP_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the per-operation store deadline.
    #[arg(long = "database-operation-timeout-seconds", value_name = "SECONDS")]
    pub database_operation_timeout_seconds: Option<u64>,

    /// Enable or disable the record cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the record cache capacity (0 = unbounded).
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Override the record cache TTL (0 = no expiry).
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Enable or disable creation notifications.
    #[arg(
        long = "notifications-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub notifications_enabled: Option<bool>,

    /// Deliver notifications to this webhook instead of the log.
    #[arg(long = "notifications-webhook-url", value_name = "URL")]
    pub notifications_webhook_url: Option<String>,

    /// Override the notification topic.
    #[arg(long = "notifications-topic", value_name = "TOPIC")]
    pub notifications_topic: Option<String>,

    /// Override the allowed CORS origin.
    #[arg(long = "cors-allowed-origin", value_name = "ORIGIN")]
    pub cors_allowed_origin: Option<String>,
}
