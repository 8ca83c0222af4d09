use config::FileFormat;

use super::*;
use crate::cache::{CacheConfig, ResourceFamily};

fn raw_from_toml(source: &str) -> RawSettings {
    Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()
        .expect("config builds")
        .try_deserialize()
        .expect("raw settings deserialize")
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:5000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.store.backend, StoreBackendKind::Disabled);
    assert_eq!(settings.store.timeout, Duration::from_millis(2000));
    assert_eq!(settings.store.max_attempts.get(), 3);
    assert_eq!(settings.cache.ttl, TtlPolicy::default());
    assert!(settings.cache.single_flight);
    assert_eq!(settings.cache.max_body_bytes.get(), 1024 * 1024);
    assert_eq!(settings.environment, AppEnvironment::Development);
    assert!(settings.rate_limit.enabled);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_from_toml(
        r#"
        [server]
        port = 4000

        [logging]
        level = "info"

        [cache.ttl]
        events = 120
        venues = 45
        "#,
    );

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_events_ttl: Some(30),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.ttl.ttl(ResourceFamily::Events), 30);
    assert_eq!(settings.cache.ttl.ttl(ResourceFamily::Venues), 45);
    assert_eq!(settings.cache.ttl.ttl(ResourceFamily::Athletes), 600);
}

#[test]
fn zero_ttl_is_rejected() {
    let overrides = ServeOverrides {
        cache_community_ttl: Some(0),
        ..Default::default()
    };
    let err = from_overrides(&overrides).expect_err("zero ttl must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl.community",
            ..
        }
    ));
}

#[test]
fn credentials_select_the_managed_store() {
    let overrides = ServeOverrides {
        store_url: Some("https://eu1-example.upstash.io".to_string()),
        store_token: Some("secret-token".to_string()),
        ..Default::default()
    };
    let settings = from_overrides(&overrides).expect("valid settings");
    assert_eq!(settings.store.backend, StoreBackendKind::Upstash);

    let debug = format!("{:?}", settings.store);
    assert!(!debug.contains("secret-token"));
    assert_eq!(settings.redacted()["store"]["token"], "<redacted>");
}

#[test]
fn explicit_backend_wins_over_credentials() {
    let mut raw = raw_from_toml(
        r#"
        [store]
        backend = "memory"
        url = "https://eu1-example.upstash.io"
        "#,
    );
    raw.apply_overrides(&ServeOverrides::default());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.store.backend, StoreBackendKind::Memory);
}

#[test]
fn unknown_backend_is_rejected() {
    let overrides = ServeOverrides {
        store_backend: Some("memcached".to_string()),
        ..Default::default()
    };
    let err = from_overrides(&overrides).expect_err("unknown backend");
    assert!(matches!(err, LoadError::Invalid { key: "store.backend", .. }));
}

#[test]
fn production_hides_cache_keys() {
    let production = from_overrides(&ServeOverrides {
        environment: Some("production".to_string()),
        ..Default::default()
    })
    .expect("valid settings");
    assert!(!CacheConfig::from(&production).expose_keys);

    let development = from_overrides(&ServeOverrides::default()).expect("valid settings");
    assert!(CacheConfig::from(&development).expose_keys);
}

#[test]
fn rate_limit_rules_default_per_class() {
    let settings = from_overrides(&ServeOverrides::default()).expect("valid settings");
    let limits = &settings.rate_limit;
    assert_eq!(limits.global.limit.get(), 1000);
    assert_eq!(limits.global.window, Duration::from_secs(900));
    assert_eq!(limits.auth.limit.get(), 5);
    assert_eq!(limits.api.limit.get(), 100);
    assert_eq!(limits.admin.limit.get(), 50);
    assert_eq!(limits.upload.window, Duration::from_secs(3600));
    assert_eq!(limits.search.limit.get(), 30);
}

#[test]
fn rate_limit_rule_can_be_overridden_from_file() {
    let raw = raw_from_toml(
        r#"
        [rate_limit.search]
        limit = 5
        window_seconds = 10
        "#,
    );
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.rate_limit.search.limit.get(), 5);
    assert_eq!(settings.rate_limit.search.window, Duration::from_secs(10));
    assert_eq!(settings.rate_limit.api.limit.get(), 100);

    let raw = raw_from_toml("[rate_limit.api]\nwindow_seconds = 0\n");
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let settings = from_overrides(&ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    })
    .expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sportsbuddy"]);
    let command = args.command.unwrap_or(Command::Serve);
    assert_eq!(command, Command::Serve);
}

#[test]
fn parse_check_config_with_overrides() {
    let args = CliArgs::parse_from([
        "sportsbuddy",
        "--server-host",
        "0.0.0.0",
        "--cache-venues-ttl",
        "60",
        "check-config",
    ]);

    assert_eq!(args.command, Some(Command::CheckConfig));
    assert_eq!(args.overrides.server_host.as_deref(), Some("0.0.0.0"));
    assert_eq!(args.overrides.cache_venues_ttl, Some(60));
}

#[test]
fn store_retry_budget_is_bounded() {
    let raw = raw_from_toml("[store]\nmax_attempts = 10\nbackoff_ms = 10000\n");
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.store.max_attempts.get(), 10);
    assert_eq!(settings.store.backoff_base, Duration::from_secs(10));

    let raw = raw_from_toml("[store]\nmax_attempts = 4000000000\n");
    let err = Settings::from_raw(raw).expect_err("too many attempts");
    assert!(matches!(err, LoadError::Invalid { key: "store.max_attempts", .. }));

    let raw = raw_from_toml("[store]\nbackoff_ms = 600000\n");
    let err = Settings::from_raw(raw).expect_err("backoff too long");
    assert!(matches!(err, LoadError::Invalid { key: "store.backoff_ms", .. }));
}

#[test]
fn trusted_proxy_hops_are_bounded() {
    let settings = from_overrides(&ServeOverrides::default()).expect("valid settings");
    assert_eq!(settings.rate_limit.trusted_proxy_hops, 0);

    let raw = raw_from_toml("[rate_limit]\ntrusted_proxy_hops = 2\n");
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.rate_limit.trusted_proxy_hops, 2);

    let raw = raw_from_toml("[rate_limit]\ntrusted_proxy_hops = 9\n");
    let err = Settings::from_raw(raw).expect_err("too many hops");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.trusted_proxy_hops",
            ..
        }
    ));
}
