//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, ReportArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bookstore";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_RATE_LIMIT_RATE: f64 = 1.0;
const DEFAULT_RATE_LIMIT_BURST: u64 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 600;
const DEFAULT_REPORTS_INTERVAL_SECS: u64 = 24;
const DEFAULT_REPORTS_LOOKBACK_HOURS: u64 = 24;
const DEFAULT_REPORTS_OUTPUT_DIR: &str = "output-reports";
/// Upper bound for every duration setting: ten years.
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub reports: ReportSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub request_timeout: Duration,
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
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub rate_per_second: f64,
    pub burst: NonZeroU32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub lookback: Duration,
    pub output_dir: PathBuf,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BOOKSTORE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Report(args)) => raw.apply_report_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    rate_limit: RawRateLimitSettings,
    cache: RawCacheSettings,
    reports: RawReportSettings,
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
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(rate) = overrides.rate_limit_rate {
            self.rate_limit.rate_per_second = Some(rate);
        }
        if let Some(burst) = overrides.rate_limit_burst {
            self.rate_limit.burst = Some(burst);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(interval) = overrides.cache_sweep_interval_seconds {
            self.cache.sweep_interval_seconds = Some(interval);
        }
        if let Some(enabled) = overrides.reports_enabled {
            self.reports.enabled = Some(enabled);
        }
        if let Some(interval) = overrides.reports_interval_seconds {
            self.reports.interval_seconds = Some(interval);
        }
    }

    fn apply_report_overrides(&mut self, args: &ReportArgs) {
        self.apply_database_override(&args.database);
        if let Some(dir) = args.output_dir.as_ref() {
            self.reports.output_dir = Some(dir.clone());
        }
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
            rate_limit,
            cache,
            reports,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            cache: build_cache_settings(cache)?,
            reports: build_report_settings(reports)?,
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

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = positive_seconds(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;
    let request_timeout = positive_seconds(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        request_timeout,
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

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let rate_per_second = rate_limit
        .rate_per_second
        .unwrap_or(DEFAULT_RATE_LIMIT_RATE);
    if !rate_per_second.is_finite() || rate_per_second <= 0.0 {
        return Err(LoadError::invalid(
            "rate_limit.rate_per_second",
            "must be a finite number greater than zero",
        ));
    }

    let burst = non_zero_u32(
        rate_limit.burst.unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        "rate_limit.burst",
    )?;
    let window = positive_seconds(
        rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        "rate_limit.window_seconds",
    )?;
    if f64::from(burst.get()) / rate_per_second > MAX_DURATION_SECS as f64 {
        return Err(LoadError::invalid(
            "rate_limit.rate_per_second",
            "too small to refill a full burst within ten years",
        ));
    }

    Ok(RateLimitSettings {
        rate_per_second,
        burst,
        window,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        ttl: positive_seconds(
            cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
            "cache.ttl_seconds",
        )?,
        sweep_interval: positive_seconds(
            cache
                .sweep_interval_seconds
                .unwrap_or(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
            "cache.sweep_interval_seconds",
        )?,
    })
}

fn build_report_settings(reports: RawReportSettings) -> Result<ReportSettings, LoadError> {
    let interval = positive_seconds(
        reports
            .interval_seconds
            .unwrap_or(DEFAULT_REPORTS_INTERVAL_SECS),
        "reports.interval_seconds",
    )?;

    let lookback_hours = reports
        .lookback_hours
        .unwrap_or(DEFAULT_REPORTS_LOOKBACK_HOURS);
    if lookback_hours == 0 {
        return Err(LoadError::invalid(
            "reports.lookback_hours",
            "must be greater than zero",
        ));
    }
    let lookback_secs = lookback_hours.checked_mul(3600).ok_or_else(|| {
        LoadError::invalid("reports.lookback_hours", "value exceeds supported range")
    })?;
    let lookback = positive_seconds(lookback_secs, "reports.lookback_hours")?;

    let output_dir = reports
        .output_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_OUTPUT_DIR));
    if output_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "reports.output_dir",
            "path must not be empty",
        ));
    }

    Ok(ReportSettings {
        enabled: reports.enabled.unwrap_or(true),
        interval,
        lookback,
        output_dir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
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
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    rate_per_second: Option<f64>,
    burst: Option<u64>,
    window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReportSettings {
    enabled: Option<bool>,
    interval_seconds: Option<u64>,
    lookback_hours: Option<u64>,
    output_dir: Option<PathBuf>,
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

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    if value > MAX_DURATION_SECS {
        return Err(LoadError::invalid(key, "must not exceed ten years"));
    }
    Ok(Duration::from_secs(value))
}
