use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Counters emitted by the cache and the rate limiter.
const COUNTERS: &[(&str, &str)] = &[
    (
        "sportsbuddy_cache_hit_total",
        "Responses served from the response cache.",
    ),
    (
        "sportsbuddy_cache_miss_total",
        "Cacheable requests that missed and ran their handler.",
    ),
    (
        "sportsbuddy_cache_write_total",
        "Responses written to the cache store after a miss.",
    ),
    (
        "sportsbuddy_cache_skip_total",
        "Responses not cached, labelled by reason.",
    ),
    (
        "sportsbuddy_cache_coalesced_total",
        "Concurrent misses answered by another request's store write.",
    ),
    (
        "sportsbuddy_cache_store_error_total",
        "Failed cache store operations, labelled by operation.",
    ),
    (
        "sportsbuddy_cache_invalidated_keys_total",
        "Cache keys removed by invalidation.",
    ),
    (
        "sportsbuddy_rate_limit_rejected_total",
        "Requests rejected by the rate limiter, labelled by class.",
    ),
];

/// Store client internals that are only interesting when asked for explicitly.
const QUIET_TARGETS: &[&str] = &["hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Install the global subscriber. `RUST_LOG` directives are layered on top of
/// the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    for directive in QUIET_TARGETS {
        let directive = directive
            .parse()
            .map_err(|err| InfraError::telemetry(format!("bad filter `{directive}`: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for (name, description) in COUNTERS {
            describe_counter!(*name, Unit::Count, *description);
        }
    });
}
