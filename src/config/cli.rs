use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the SportsBuddy API binary.
#[derive(Debug, Parser)]
#[command(name = "sportsbuddy", version, about = "SportsBuddy API server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SPORTSBUDDY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Print the resolved settings with secrets redacted, then exit.
    #[command(name = "check-config")]
    CheckConfig,
}

/// Flags that override file and `SPORTSBUDDY__*` settings.
///
/// Several flags also read the flat environment variables used by existing
/// deployments (`UPSTASH_REDIS_REST_URL`, `CACHE_EVENTS_TTL`, ...).
#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", env = "PORT", value_name = "PORT")]
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

    /// Deployment environment (development|test|production).
    #[arg(long = "environment", env = "APP_ENV", value_name = "ENV")]
    pub environment: Option<String>,

    /// Cache store backend (upstash|memory|disabled).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// REST endpoint of the managed Redis store.
    #[arg(long = "store-url", env = "UPSTASH_REDIS_REST_URL", value_name = "URL")]
    pub store_url: Option<String>,

    /// Bearer token for the managed Redis store.
    #[arg(
        long = "store-token",
        env = "UPSTASH_REDIS_REST_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true
    )]
    pub store_token: Option<String>,

    /// Per-attempt store request timeout.
    #[arg(long = "store-timeout-ms", value_name = "MILLIS")]
    pub store_timeout_ms: Option<u64>,

    /// Attempts per store command, including the first.
    #[arg(long = "store-max-attempts", value_name = "COUNT")]
    pub store_max_attempts: Option<u64>,

    #[arg(long = "cache-events-ttl", env = "CACHE_EVENTS_TTL", value_name = "SECONDS")]
    pub cache_events_ttl: Option<u64>,

    #[arg(long = "cache-leaderboard-ttl", env = "CACHE_LEADERBOARD_TTL", value_name = "SECONDS")]
    pub cache_leaderboard_ttl: Option<u64>,

    #[arg(long = "cache-athletes-ttl", env = "CACHE_ATHLETES_TTL", value_name = "SECONDS")]
    pub cache_athletes_ttl: Option<u64>,

    #[arg(long = "cache-venues-ttl", env = "CACHE_VENUES_TTL", value_name = "SECONDS")]
    pub cache_venues_ttl: Option<u64>,

    #[arg(long = "cache-community-ttl", env = "CACHE_COMMUNITY_TTL", value_name = "SECONDS")]
    pub cache_community_ttl: Option<u64>,

    #[arg(long = "cache-admin-ttl", env = "CACHE_ADMIN_TTL", value_name = "SECONDS")]
    pub cache_admin_ttl: Option<u64>,

    #[arg(long = "cache-default-ttl", env = "CACHE_DEFAULT_TTL", value_name = "SECONDS")]
    pub cache_default_ttl: Option<u64>,

    /// Coalesce concurrent cache misses for the same key.
    #[arg(
        long = "cache-single-flight",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_single_flight: Option<bool>,

    /// Toggle the store-backed rate limiter.
    #[arg(
        long = "rate-limit-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub rate_limit_enabled: Option<bool>,
}
