//! Store-backed sliding-window rate limiting.
//!
//! Each class counts requests per client in fixed windows kept in the cache
//! store. The estimate for the current moment weights the previous window by
//! the share of it still inside the sliding window:
//!
//! `estimate = previous * (1 - elapsed / window) + current`
//!
//! All replicas sharing a store therefore share the same budget. Without a
//! store the limiter admits everything.

use std::time::{SystemTime, UNIX_EPOCH};

use metrics::counter;
use tracing::debug;

use crate::cache::CacheStore;
use crate::config::{RateLimitRule, RateLimitSettings};

const KEY_PREFIX: &str = "ratelimit";
const METRIC_REJECTED: &str = "sportsbuddy_rate_limit_rejected_total";

/// Route class with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitClass {
    Global,
    Auth,
    Api,
    Admin,
    Upload,
    Search,
}

impl RateLimitClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitClass::Global => "global",
            RateLimitClass::Auth => "auth",
            RateLimitClass::Api => "api",
            RateLimitClass::Admin => "admin",
            RateLimitClass::Upload => "upload",
            RateLimitClass::Search => "search",
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// End of the current window, unix epoch milliseconds.
    pub reset_ms: u64,
    /// Seconds until the current window ends, at least 1.
    pub retry_after: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: CacheStore,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: CacheStore, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn is_active(&self) -> bool {
        self.settings.enabled && self.store.is_enabled()
    }

    pub fn trusted_proxy_hops(&self) -> u32 {
        self.settings.trusted_proxy_hops
    }

    pub fn rule(&self, class: RateLimitClass) -> RateLimitRule {
        match class {
            RateLimitClass::Global => self.settings.global,
            RateLimitClass::Auth => self.settings.auth,
            RateLimitClass::Api => self.settings.api,
            RateLimitClass::Admin => self.settings.admin,
            RateLimitClass::Upload => self.settings.upload,
            RateLimitClass::Search => self.settings.search,
        }
    }

    /// Record one request from `client` and decide whether it may proceed.
    pub async fn check(&self, class: RateLimitClass, client: &str) -> RateLimitDecision {
        self.check_at(class, client, now_ms()).await
    }

    pub async fn check_at(
        &self,
        class: RateLimitClass,
        client: &str,
        now_ms: u64,
    ) -> RateLimitDecision {
        let rule = self.rule(class);
        let limit = rule.limit.get();
        let window_ms = u64::try_from(rule.window.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let index = now_ms / window_ms;
        let elapsed = now_ms % window_ms;
        let reset_ms = (index + 1) * window_ms;
        let retry_after = (reset_ms - now_ms).div_ceil(1000).max(1);

        let open = RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit,
            reset_ms,
            retry_after,
        };
        if !self.is_active() {
            return open;
        }

        let current_key = window_key(class, client, index);
        let current = self.store.increment(&current_key).await;
        if current <= 0 {
            // store unreachable
            return open;
        }
        if current == 1 {
            let ttl = u32::try_from(rule.window.as_secs().saturating_mul(2).max(1))
                .unwrap_or(u32::MAX);
            self.store.expire(&current_key, ttl).await;
        }

        let previous: u64 = match index.checked_sub(1) {
            Some(prev) => self
                .store
                .get(window_key(class, client, prev))
                .await
                .unwrap_or(0),
            None => 0,
        };

        let weight = (window_ms - elapsed) as f64 / window_ms as f64;
        let estimate = previous as f64 * weight + current as f64;
        let allowed = estimate <= f64::from(limit);
        let remaining = (f64::from(limit) - estimate).floor().max(0.0) as u32;

        if !allowed {
            counter!(METRIC_REJECTED, "class" => class.as_str()).increment(1);
            debug!(
                target = "sportsbuddy::rate_limit",
                class = class.as_str(),
                client,
                estimate,
                limit,
                "request rejected"
            );
        }

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_ms,
            retry_after,
        }
    }
}

fn window_key(class: RateLimitClass, client: &str, index: u64) -> String {
    format!("{KEY_PREFIX}:{}:{client}:{index}", class.as_str())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
