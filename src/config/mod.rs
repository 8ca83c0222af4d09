//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment as EnvSource, File};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{
    DEFAULT_ADMIN_TTL, DEFAULT_ATHLETES_TTL, DEFAULT_COMMUNITY_TTL, DEFAULT_EVENTS_TTL,
    DEFAULT_LEADERBOARD_TTL, DEFAULT_TTL, DEFAULT_VENUES_TTL, TtlPolicy,
};

pub use cli::{CliArgs, Command, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sportsbuddy";
const ENV_PREFIX: &str = "SPORTSBUDDY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_STORE_MAX_ATTEMPTS: u64 = 3;
const DEFAULT_STORE_BACKOFF_MS: u64 = 100;
const DEFAULT_CACHE_MAX_BODY_BYTES: u64 = 1024 * 1024;
const MAX_TRUSTED_PROXY_HOPS: u32 = 8;
const MAX_STORE_ATTEMPTS: u64 = 10;
const MAX_STORE_BACKOFF_MS: u64 = 10_000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub environment: AppEnvironment,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    /// Managed Redis over its REST interface.
    Upstash,
    /// Process-local map; for development and tests.
    Memory,
    Disabled,
}

impl StoreBackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upstash" | "redis" => Some(Self::Upstash),
            "memory" => Some(Self::Memory),
            "disabled" | "none" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstash => "upstash",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Clone)]
pub struct StoreSettings {
    pub backend: StoreBackendKind,
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout: Duration,
    pub max_attempts: NonZeroU32,
    pub backoff_base: Duration,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: TtlPolicy,
    pub single_flight: bool,
    pub max_body_bytes: NonZeroUsize,
}

/// One `(limit, window)` pair of the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: NonZeroU32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Reverse proxies in front of the service that append to
    /// `X-Forwarded-For`. Zero keys clients on the peer address.
    pub trusted_proxy_hops: u32,
    pub global: RateLimitRule,
    pub auth: RateLimitRule,
    pub api: RateLimitRule,
    pub admin: RateLimitRule,
    pub upload: RateLimitRule,
    pub search: RateLimitRule,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trusted_proxy_hops: 0,
            global: default_rule(1000, 15 * 60),
            auth: default_rule(5, 15 * 60),
            api: default_rule(100, 60),
            admin: default_rule(50, 60),
            upload: default_rule(10, 60 * 60),
            search: default_rule(30, 60),
        }
    }
}

fn default_rule(limit: u32, window_secs: u64) -> RateLimitRule {
    RateLimitRule {
        limit: NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN),
        window: Duration::from_secs(window_secs),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
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

    if let Some(path) = cli.config_file.as_deref() {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(EnvSource::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// Resolve settings from CLI-style overrides alone, ignoring files and the
/// environment.
pub fn from_overrides(overrides: &ServeOverrides) -> Result<Settings, LoadError> {
    let mut raw = RawSettings::default();
    raw.apply_overrides(overrides);
    Settings::from_raw(raw)
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            cache,
            rate_limit,
            environment,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            environment: build_environment(environment)?,
        })
    }

    /// Settings as JSON with the store token redacted.
    pub fn redacted(&self) -> Value {
        let rule = |rule: &RateLimitRule| {
            json!({ "limit": rule.limit.get(), "window_seconds": rule.window.as_secs() })
        };
        let ttl = &self.cache.ttl;
        json!({
            "environment": self.environment.as_str(),
            "server": {
                "addr": self.server.addr.to_string(),
                "graceful_shutdown_seconds": self.server.graceful_shutdown.as_secs(),
            },
            "logging": {
                "level": self.logging.level.to_string(),
                "json": matches!(self.logging.format, LogFormat::Json),
            },
            "store": {
                "backend": self.store.backend.as_str(),
                "url": self.store.url,
                "token": self.store.token.as_ref().map(|_| "<redacted>"),
                "timeout_ms": self.store.timeout.as_millis() as u64,
                "max_attempts": self.store.max_attempts.get(),
            },
            "cache": {
                "single_flight": self.cache.single_flight,
                "max_body_bytes": self.cache.max_body_bytes.get(),
                "ttl": {
                    "events": ttl.events.get(),
                    "leaderboard": ttl.leaderboard.get(),
                    "athletes": ttl.athletes.get(),
                    "venues": ttl.venues.get(),
                    "community": ttl.community.get(),
                    "admin": ttl.admin.get(),
                    "default": ttl.default.get(),
                },
            },
            "rate_limit": {
                "enabled": self.rate_limit.enabled,
                "trusted_proxy_hops": self.rate_limit.trusted_proxy_hops,
                "global": rule(&self.rate_limit.global),
                "auth": rule(&self.rate_limit.auth),
                "api": rule(&self.rate_limit.api),
                "admin": rule(&self.rate_limit.admin),
                "upload": rule(&self.rate_limit.upload),
                "search": rule(&self.rate_limit.search),
            },
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

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let url = non_empty(store.url);
    let token = non_empty(store.token);

    let backend = match non_empty(store.backend) {
        Some(value) => StoreBackendKind::parse(&value).ok_or_else(|| {
            LoadError::invalid(
                "store.backend",
                format!("unknown backend `{value}` (expected upstash, memory or disabled)"),
            )
        })?,
        // Credentials imply the managed store; a missing half is reported at startup.
        None if url.is_some() || token.is_some() => StoreBackendKind::Upstash,
        None => StoreBackendKind::Disabled,
    };

    if let Some(url) = url.as_deref() {
        url::Url::parse(url)
            .map_err(|err| LoadError::invalid("store.url", format!("invalid URL: {err}")))?;
    }

    let timeout_ms = store.timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "store.timeout_ms",
            "must be greater than zero",
        ));
    }
    let max_attempts = store.max_attempts.unwrap_or(DEFAULT_STORE_MAX_ATTEMPTS);
    if max_attempts > MAX_STORE_ATTEMPTS {
        return Err(LoadError::invalid(
            "store.max_attempts",
            format!("must be at most {MAX_STORE_ATTEMPTS}"),
        ));
    }
    let max_attempts = non_zero_u32(max_attempts, "store.max_attempts")?;
    let backoff_ms = store.backoff_ms.unwrap_or(DEFAULT_STORE_BACKOFF_MS);
    if backoff_ms > MAX_STORE_BACKOFF_MS {
        return Err(LoadError::invalid(
            "store.backoff_ms",
            format!("must be at most {MAX_STORE_BACKOFF_MS}"),
        ));
    }

    Ok(StoreSettings {
        backend,
        url,
        token,
        timeout: Duration::from_millis(timeout_ms),
        max_attempts,
        backoff_base: Duration::from_millis(backoff_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let RawTtlSettings {
        events,
        leaderboard,
        athletes,
        venues,
        community,
        admin,
        default,
    } = cache.ttl;

    let ttl = TtlPolicy {
        events: non_zero_u32(events.unwrap_or(DEFAULT_EVENTS_TTL.into()), "cache.ttl.events")?,
        leaderboard: non_zero_u32(
            leaderboard.unwrap_or(DEFAULT_LEADERBOARD_TTL.into()),
            "cache.ttl.leaderboard",
        )?,
        athletes: non_zero_u32(
            athletes.unwrap_or(DEFAULT_ATHLETES_TTL.into()),
            "cache.ttl.athletes",
        )?,
        venues: non_zero_u32(venues.unwrap_or(DEFAULT_VENUES_TTL.into()), "cache.ttl.venues")?,
        community: non_zero_u32(
            community.unwrap_or(DEFAULT_COMMUNITY_TTL.into()),
            "cache.ttl.community",
        )?,
        admin: non_zero_u32(admin.unwrap_or(DEFAULT_ADMIN_TTL.into()), "cache.ttl.admin")?,
        default: non_zero_u32(default.unwrap_or(DEFAULT_TTL.into()), "cache.ttl.default")?,
    };

    let max_body_bytes_value = cache
        .max_body_bytes
        .unwrap_or(DEFAULT_CACHE_MAX_BODY_BYTES);
    let max_body_bytes = usize::try_from(max_body_bytes_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.max_body_bytes",
                "must be greater than zero and fit in usize",
            )
        })?;

    Ok(CacheSettings {
        ttl,
        single_flight: cache.single_flight.unwrap_or(true),
        max_body_bytes,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let defaults = RateLimitSettings::default();
    Ok(RateLimitSettings {
        enabled: rate_limit.enabled.unwrap_or(defaults.enabled),
        trusted_proxy_hops: build_proxy_hops(rate_limit.trusted_proxy_hops)?,
        global: build_rule(rate_limit.global, defaults.global, "rate_limit.global")?,
        auth: build_rule(rate_limit.auth, defaults.auth, "rate_limit.auth")?,
        api: build_rule(rate_limit.api, defaults.api, "rate_limit.api")?,
        admin: build_rule(rate_limit.admin, defaults.admin, "rate_limit.admin")?,
        upload: build_rule(rate_limit.upload, defaults.upload, "rate_limit.upload")?,
        search: build_rule(rate_limit.search, defaults.search, "rate_limit.search")?,
    })
}

fn build_proxy_hops(hops: Option<u64>) -> Result<u32, LoadError> {
    match hops {
        None => Ok(0),
        Some(hops) if hops <= u64::from(MAX_TRUSTED_PROXY_HOPS) => Ok(hops as u32),
        Some(_) => Err(LoadError::invalid(
            "rate_limit.trusted_proxy_hops",
            format!("must be at most {MAX_TRUSTED_PROXY_HOPS}"),
        )),
    }
}

fn build_rule(
    raw: RawRateLimitRule,
    default: RateLimitRule,
    key: &'static str,
) -> Result<RateLimitRule, LoadError> {
    let limit = match raw.limit {
        Some(limit) => non_zero_u32(limit, key)?,
        None => default.limit,
    };
    let window = match raw.window_seconds {
        Some(0) => return Err(LoadError::invalid(key, "window must be greater than zero")),
        Some(seconds) => Duration::from_secs(seconds),
        None => default.window,
    };
    Ok(RateLimitRule { limit, window })
}

fn build_environment(environment: Option<String>) -> Result<AppEnvironment, LoadError> {
    match non_empty(environment) {
        Some(value) => value
            .parse()
            .map_err(|reason: String| LoadError::invalid("environment", reason)),
        None => Ok(AppEnvironment::default()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
    environment: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
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
        if let Some(environment) = overrides.environment.as_ref() {
            self.environment = Some(environment.clone());
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.store_url.as_ref() {
            self.store.url = Some(url.clone());
        }
        if let Some(token) = overrides.store_token.as_ref() {
            self.store.token = Some(token.clone());
        }
        if let Some(timeout) = overrides.store_timeout_ms {
            self.store.timeout_ms = Some(timeout);
        }
        if let Some(attempts) = overrides.store_max_attempts {
            self.store.max_attempts = Some(attempts);
        }
        if let Some(single_flight) = overrides.cache_single_flight {
            self.cache.single_flight = Some(single_flight);
        }
        if let Some(enabled) = overrides.rate_limit_enabled {
            self.rate_limit.enabled = Some(enabled);
        }

        let ttl = &mut self.cache.ttl;
        for (slot, value) in [
            (&mut ttl.events, overrides.cache_events_ttl),
            (&mut ttl.leaderboard, overrides.cache_leaderboard_ttl),
            (&mut ttl.athletes, overrides.cache_athletes_ttl),
            (&mut ttl.venues, overrides.cache_venues_ttl),
            (&mut ttl.community, overrides.cache_community_ttl),
            (&mut ttl.admin, overrides.cache_admin_ttl),
            (&mut ttl.default, overrides.cache_default_ttl),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
    }
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
struct RawStoreSettings {
    backend: Option<String>,
    url: Option<String>,
    token: Option<String>,
    timeout_ms: Option<u64>,
    max_attempts: Option<u64>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl: RawTtlSettings,
    single_flight: Option<bool>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTtlSettings {
    events: Option<u64>,
    leaderboard: Option<u64>,
    athletes: Option<u64>,
    venues: Option<u64>,
    community: Option<u64>,
    admin: Option<u64>,
    default: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    enabled: Option<bool>,
    trusted_proxy_hops: Option<u64>,
    global: RawRateLimitRule,
    auth: RawRateLimitRule,
    api: RawRateLimitRule,
    admin: RawRateLimitRule,
    upload: RawRateLimitRule,
    search: RawRateLimitRule,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitRule {
    limit: Option<u64>,
    window_seconds: Option<u64>,
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

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests;
