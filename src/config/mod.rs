//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderValue;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "shopkeep";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_NOTIFICATION_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_NOTIFICATION_TOPIC: &str = "test_topic";
const DEFAULT_NOTIFICATION_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub notifications: NotificationSettings,
    pub cors: CorsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    /// Deadline applied to every store operation.
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Zero means unbounded.
    pub capacity: usize,
    /// Zero means no expiry.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub queue_capacity: NonZeroUsize,
    /// Broker endpoint; notifications are only logged when unset.
    pub webhook_url: Option<Url>,
    pub topic: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub allowed_origin: HeaderValue,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SHOPKEEP").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    notifications: RawNotificationSettings,
    cors: RawCorsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(seconds) = overrides.database_operation_timeout_seconds {
            self.database.operation_timeout_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = Some(enabled);
        }
        if let Some(url) = overrides.notifications_webhook_url.as_ref() {
            self.notifications.webhook_url = Some(url.clone());
        }
        if let Some(topic) = overrides.notifications_topic.as_ref() {
            self.notifications.topic = Some(topic.clone());
        }
        if let Some(origin) = overrides.cors_allowed_origin.as_ref() {
            self.cors.allowed_origin = Some(origin.clone());
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            notifications,
            cors,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache);
        let notifications = build_notification_settings(notifications)?;
        let cors = build_cors_settings(cors)?;

        Ok(Self {
            server,
            logging,
            database,
            cache,
            notifications,
            cors,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    let timeout_secs = database
        .operation_timeout_seconds
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "database.operation_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        operation_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity: cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        ttl_seconds: cache.ttl_seconds.unwrap_or(0),
    }
}

fn build_notification_settings(
    notifications: RawNotificationSettings,
) -> Result<NotificationSettings, LoadError> {
    let queue_value = notifications
        .queue_capacity
        .unwrap_or(DEFAULT_NOTIFICATION_QUEUE_CAPACITY);
    let queue_capacity = NonZeroUsize::new(queue_value).ok_or_else(|| {
        LoadError::invalid("notifications.queue_capacity", "must be greater than zero")
    })?;

    let webhook_url = notifications
        .webhook_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| {
            let url = Url::parse(&value).map_err(|err| {
                LoadError::invalid("notifications.webhook_url", format!("invalid url: {err}"))
            })?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(LoadError::invalid(
                    "notifications.webhook_url",
                    format!("unsupported scheme `{other}`"),
                )),
            }
        })
        .transpose()?;

    let topic = notifications
        .topic
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_NOTIFICATION_TOPIC.to_string());
    if topic.is_empty() {
        return Err(LoadError::invalid(
            "notifications.topic",
            "must not be empty",
        ));
    }

    let timeout_secs = notifications
        .request_timeout_seconds
        .unwrap_or(DEFAULT_NOTIFICATION_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "notifications.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(NotificationSettings {
        enabled: notifications.enabled.unwrap_or(true),
        queue_capacity,
        webhook_url,
        topic,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cors_settings(cors: RawCorsSettings) -> Result<CorsSettings, LoadError> {
    let origin = cors
        .allowed_origin
        .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
    let origin = origin.trim();
    if origin.is_empty() {
        return Err(LoadError::invalid("cors.allowed_origin", "must not be empty"));
    }
    let allowed_origin = HeaderValue::from_str(origin).map_err(|err| {
        LoadError::invalid("cors.allowed_origin", format!("invalid header value: {err}"))
    })?;

    Ok(CorsSettings { allowed_origin })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    operation_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotificationSettings {
    enabled: Option<bool>,
    queue_capacity: Option<usize>,
    webhook_url: Option<String>,
    topic: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    allowed_origin: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
