//! Cache store adapter.
//!
//! The only component that talks to the backend. Every operation returns a
//! failure-safe default (`None`, `false`, `0`) instead of an error, so a broken
//! or missing store looks exactly like an empty cache.

use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, warn};

use crate::config::{StoreBackendKind, StoreSettings};

use super::backend::{BackendError, CacheBackend};
use super::memory::MemoryBackend;
use super::upstash::{UpstashBackend, UpstashConfig};

const METRIC_STORE_ERROR: &str = "sportsbuddy_cache_store_error_total";
const METRIC_INVALIDATED: &str = "sportsbuddy_cache_invalidated_keys_total";

#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Arc<dyn CacheBackend>>,
    default_ttl: u32,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend_name())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: u32) -> Self {
        Self {
            backend: Some(backend),
            default_ttl: default_ttl.max(1),
        }
    }

    /// A store on which every operation is a no-op.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            default_ttl: 1,
        }
    }

    pub fn memory(default_ttl: u32) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), default_ttl)
    }

    /// Build the process-wide store from settings.
    ///
    /// Missing endpoint or token puts the store in disabled mode for the life of
    /// the process; this is logged here once and never again per call.
    pub fn from_settings(settings: &StoreSettings, default_ttl: u32) -> Self {
        match settings.backend {
            StoreBackendKind::Disabled => {
                info!(target = "sportsbuddy::cache::store", "response cache disabled by configuration");
                Self::disabled()
            }
            StoreBackendKind::Memory => {
                info!(target = "sportsbuddy::cache::store", backend = "memory", "response cache enabled");
                Self::memory(default_ttl)
            }
            StoreBackendKind::Upstash => {
                let (Some(url), Some(token)) = (settings.url.clone(), settings.token.clone())
                else {
                    warn!(
                        target = "sportsbuddy::cache::store",
                        url_present = settings.url.is_some(),
                        token_present = settings.token.is_some(),
                        "store endpoint or token missing; response cache disabled"
                    );
                    return Self::disabled();
                };
                let config = UpstashConfig {
                    url,
                    token,
                    timeout: settings.timeout,
                    max_attempts: settings.max_attempts.get(),
                    backoff_base: settings.backoff_base,
                };
                match UpstashBackend::new(config) {
                    Ok(backend) => {
                        info!(target = "sportsbuddy::cache::store", backend = "upstash", "response cache enabled");
                        Self::new(Arc::new(backend), default_ttl)
                    }
                    Err(err) => {
                        error!(
                            target = "sportsbuddy::cache::store",
                            error = %err,
                            "failed to build store client; response cache disabled"
                        );
                        Self::disabled()
                    }
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
            .as_ref()
            .map(|backend| backend.name())
            .unwrap_or("disabled")
    }

    pub fn default_ttl(&self) -> u32 {
        self.default_ttl
    }

    /// Read and decode a value; any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let key = key.as_ref();
        let raw = match backend.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                report("get", key, &err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "sportsbuddy::cache::store",
                    key,
                    error = %err,
                    "cached value could not be decoded; treating as miss"
                );
                None
            }
        }
    }

    /// Encode and write a value with an expiry. `None` uses the default TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: impl AsRef<str>,
        value: &T,
        ttl_secs: Option<u32>,
    ) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let key = key.as_ref();
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(target = "sportsbuddy::cache::store", key, error = %err, "value could not be encoded");
                return false;
            }
        };
        let ttl = ttl_secs.filter(|ttl| *ttl > 0).unwrap_or(self.default_ttl);
        match backend.set_ex(key, encoded, ttl).await {
            Ok(()) => {
                debug!(target = "sportsbuddy::cache::store", key, ttl, "cache entry written");
                true
            }
            Err(err) => {
                report("set", key, &err);
                false
            }
        }
    }

    /// Delete one key. Deleting a missing key counts as success.
    pub async fn delete(&self, key: impl AsRef<str>) -> bool {
        self.delete_one(key.as_ref()).await.is_some()
    }

    /// Delete one key; returns `1` only when the key existed.
    pub async fn remove(&self, key: impl AsRef<str>) -> u64 {
        self.delete_one(key.as_ref()).await.unwrap_or(0)
    }

    async fn delete_one(&self, key: &str) -> Option<u64> {
        let backend = self.backend.as_ref()?;
        match backend.del(&[key.to_string()]).await {
            Ok(removed) => {
                counter!(METRIC_INVALIDATED).increment(removed);
                Some(removed)
            }
            Err(err) => {
                report("delete", key, &err);
                None
            }
        }
    }

    /// Delete every key matching a glob; returns how many were removed.
    pub async fn delete_by_pattern(&self, pattern: impl AsRef<str>) -> u64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        let pattern = pattern.as_ref();
        let keys = match backend.scan_match(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                report("scan", pattern, &err);
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match backend.del(&keys).await {
            Ok(removed) => {
                debug!(target = "sportsbuddy::cache::store", pattern, removed, "pattern invalidated");
                counter!(METRIC_INVALIDATED).increment(removed);
                removed
            }
            Err(err) => {
                report("delete_by_pattern", pattern, &err);
                0
            }
        }
    }

    /// Increment a counter; `0` when the store is unavailable.
    pub async fn increment(&self, key: impl AsRef<str>) -> i64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        let key = key.as_ref();
        backend.incr(key).await.unwrap_or_else(|err| {
            report("increment", key, &err);
            0
        })
    }

    pub async fn expire(&self, key: impl AsRef<str>, ttl_secs: u32) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let key = key.as_ref();
        backend.expire(key, ttl_secs.max(1)).await.unwrap_or_else(|err| {
            report("expire", key, &err);
            false
        })
    }

    /// Whether the backend answers at all.
    pub async fn ping(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.ping().await {
            Ok(()) => true,
            Err(err) => {
                report("ping", "", &err);
                false
            }
        }
    }
}

fn report(op: &'static str, key: &str, err: &BackendError) {
    counter!(METRIC_STORE_ERROR, "op" => op).increment(1);
    warn!(
        target = "sportsbuddy::cache::store",
        op,
        key,
        error = %err,
        "cache store operation failed; continuing without cache"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Backend whose every command fails like an unreachable server.
    struct UnreachableBackend;

    #[async_trait]
    impl CacheBackend for UnreachableBackend {
        fn name(&self) -> &'static str {
            "unreachable"
        }
        async fn get(&self, _: &str) -> Result<Option<String>, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn set_ex(&self, _: &str, _: String, _: u32) -> Result<(), BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn del(&self, _: &[String]) -> Result<u64, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn scan_match(&self, _: &str) -> Result<Vec<String>, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn incr(&self, _: &str) -> Result<i64, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn expire(&self, _: &str, _: u32) -> Result<bool, BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), BackendError> {
            Err(BackendError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn round_trip_returns_equal_value() {
        let store = CacheStore::memory(300);
        let value = json!({"success": true, "data": [1, 2, 3], "nested": {"a": "b"}});
        assert!(store.set("events:detail:1", &value, Some(60)).await);
        let cached: Option<serde_json::Value> = store.get("events:detail:1").await;
        assert_eq!(cached, Some(value));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_values_are_not_returned() {
        let store = CacheStore::memory(300);
        assert!(store.set("short", &json!(1), Some(1)).await);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get::<serde_json::Value>("short").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ttl_uses_default_expiry() {
        let store = CacheStore::memory(5);
        assert!(store.set("k", &json!("v"), None).await);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get::<String>("k").await.is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get::<String>("k").await.is_none());
    }

    #[tokio::test]
    async fn pattern_delete_removes_matches_only() {
        let store = CacheStore::memory(300);
        store.set("events:list:page:1:x", &json!("v1"), None).await;
        store.set("events:list:page:2:y", &json!("v2"), None).await;
        store.set("events:detail:9", &json!("keep"), None).await;

        assert_eq!(store.delete_by_pattern("events:list:*").await, 2);
        assert!(store.get::<String>("events:list:page:1:x").await.is_none());
        assert!(store.get::<String>("events:list:page:2:y").await.is_none());
        assert!(store.get::<String>("events:detail:9").await.is_some());
        assert_eq!(store.delete_by_pattern("events:list:*").await, 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = CacheStore::memory(300);
        store.set("k", &json!(1), None).await;
        assert!(store.delete("k").await);
        assert!(store.delete("k").await);
    }

    #[tokio::test]
    async fn remove_counts_only_existing_keys() {
        let store = CacheStore::memory(60);
        assert_eq!(store.remove("events:detail:1").await, 0);
        store.set("events:detail:1", &1, None).await;
        assert_eq!(store.remove("events:detail:1").await, 1);
        assert_eq!(store.remove("events:detail:1").await, 0);
    }

    #[tokio::test]
    async fn undecodable_value_is_a_miss() {
        let store = CacheStore::memory(300);
        store.set("k", &json!("text"), None).await;
        assert_eq!(store.get::<u64>("k").await, None);
    }

    #[tokio::test]
    async fn disabled_store_returns_defaults() {
        let store = CacheStore::disabled();
        assert!(!store.is_enabled());
        assert_eq!(store.get::<serde_json::Value>("k").await, None);
        assert!(!store.set("k", &json!(1), Some(10)).await);
        assert!(!store.delete("k").await);
        assert_eq!(store.delete_by_pattern("k*").await, 0);
        assert_eq!(store.increment("k").await, 0);
        assert!(!store.expire("k", 10).await);
        assert!(!store.ping().await);
    }

    #[tokio::test]
    async fn failing_backend_returns_defaults() {
        let store = CacheStore::new(Arc::new(UnreachableBackend), 300);
        assert!(store.is_enabled());
        assert_eq!(store.get::<serde_json::Value>("k").await, None);
        assert!(!store.set("k", &json!(1), Some(10)).await);
        assert!(!store.delete("k").await);
        assert_eq!(store.delete_by_pattern("k*").await, 0);
        assert_eq!(store.increment("k").await, 0);
        assert!(!store.expire("k", 10).await);
    }

    #[test]
    fn missing_credentials_disable_the_store() {
        let settings = StoreSettings {
            backend: StoreBackendKind::Upstash,
            url: Some("https://example.upstash.io".into()),
            token: None,
            timeout: Duration::from_secs(1),
            max_attempts: std::num::NonZeroU32::MIN,
            backoff_base: Duration::from_millis(10),
        };
        let store = CacheStore::from_settings(&settings, 300);
        assert!(!store.is_enabled());
        assert_eq!(store.backend_name(), "disabled");
    }
}
