#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode},
};
use serde_json::Value;
use sportsbuddy::cache::{
    BackendError, CacheBackend, CacheConfig, CacheContext, CacheKey, CacheStore,
};
use sportsbuddy::config::RateLimitSettings;
use sportsbuddy::infra::http::{self, ApiState};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub cache: CacheContext,
}

impl TestApp {
    /// In-memory store, keys exposed on hits, rate limiting off.
    pub fn new() -> Self {
        let config = CacheConfig {
            expose_keys: true,
            ..CacheConfig::default()
        };
        let cache = CacheContext::new(CacheStore::memory(config.ttl.default_ttl()), config);
        Self::with_cache(cache, disabled_rate_limits())
    }

    pub fn with_cache(cache: CacheContext, rate_limit: RateLimitSettings) -> Self {
        let state = ApiState::in_memory(cache.clone(), rate_limit);
        Self {
            router: http::build_router(state),
            cache,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response")
    }

    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri, None).await
    }

    /// Cache writes happen on a spawned task; wait until `key` lands.
    pub async fn wait_for_key(&self, key: &CacheKey) {
        for _ in 0..200 {
            if self.cache.store().get::<Value>(key).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache key {key} was never written");
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn disabled_rate_limits() -> RateLimitSettings {
    RateLimitSettings {
        enabled: false,
        ..RateLimitSettings::default()
    }
}

/// Enabled backend whose every command fails, counting the attempts.
#[derive(Debug, Default)]
pub struct FailingBackend {
    pub writes: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FailingBackend {
    pub fn store(self: &Arc<Self>) -> CacheStore {
        CacheStore::new(Arc::clone(self) as Arc<dyn CacheBackend>, 60)
    }

    fn fail(&self) -> BackendError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        BackendError::Transport("connection reset by peer".to_string())
    }

    /// Spawned cache writes land after the response; wait for one attempt.
    pub async fn wait_for_write_attempt(&self) {
        for _ in 0..200 {
            if self.writes.load(Ordering::SeqCst) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no cache write was attempted");
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
        Err(self.fail())
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: u32) -> Result<(), BackendError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(self.fail())
    }

    async fn del(&self, _keys: &[String]) -> Result<u64, BackendError> {
        Err(self.fail())
    }

    async fn scan_match(&self, _pattern: &str) -> Result<Vec<String>, BackendError> {
        Err(self.fail())
    }

    async fn incr(&self, _key: &str) -> Result<i64, BackendError> {
        Err(self.fail())
    }

    async fn expire(&self, _key: &str, _ttl: u32) -> Result<bool, BackendError> {
        Err(self.fail())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Err(self.fail())
    }
}
