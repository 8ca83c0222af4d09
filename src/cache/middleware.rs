//! Read-through response cache middleware.
//!
//! Caches `GET` responses of JSON routes under a key derived from the request.
//! A hit is served without invoking the handler. A miss runs the handler and,
//! when the response is eligible, stores it on a spawned task so the client is
//! never delayed by the store.

use std::sync::Arc;

use axum::{
    Json,
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{
        HeaderValue, Method, StatusCode, header, request::Parts, response::Parts as ResponseParts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::context::CacheContext;
use super::envelope::{CacheEligibility, annotate_hit, body_allows_caching, strip_annotations};
use super::flight::{Flight, FlightGuard, wait_for_leader};
use super::keys::CacheKey;

const METRIC_HIT: &str = "sportsbuddy_cache_hit_total";
const METRIC_MISS: &str = "sportsbuddy_cache_miss_total";
const METRIC_WRITE: &str = "sportsbuddy_cache_write_total";
const METRIC_SKIP: &str = "sportsbuddy_cache_skip_total";
const METRIC_COALESCED: &str = "sportsbuddy_cache_coalesced_total";

type KeyFn = dyn Fn(&Parts) -> Option<CacheKey> + Send + Sync;

/// Per-route cache settings: how to derive the key and how long to keep it.
#[derive(Clone)]
pub struct CacheRoute {
    context: CacheContext,
    key_fn: Arc<KeyFn>,
    ttl: u32,
}

impl std::fmt::Debug for CacheRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRoute")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CacheRoute {
    /// `key_fn` returning `None` means the request is not cached.
    pub fn new<F>(context: CacheContext, key_fn: F, ttl: u32) -> Self
    where
        F: Fn(&Parts) -> Option<CacheKey> + Send + Sync + 'static,
    {
        Self {
            context,
            key_fn: Arc::new(key_fn),
            ttl: ttl.max(1),
        }
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    fn expose_key(&self) -> bool {
        self.context.config().expose_keys
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(route): State<CacheRoute>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET || !route.context.store().is_enabled() {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let key = (route.key_fn)(&parts);
    let request = Request::from_parts(parts, body);
    let Some(key) = key else {
        skip("no_key");
        return next.run(request).await;
    };

    if let Some(hit) = lookup(&route, &key).await {
        counter!(METRIC_HIT).increment(1);
        debug!(cache = "response", outcome = "hit", key = %key, "serving cached response");
        return hit;
    }
    counter!(METRIC_MISS).increment(1);

    let guard = if route.context.config().single_flight {
        match route.context.flights().join(key.as_str()) {
            Flight::Leader(guard) => {
                // a previous leader may have finished between our miss and the join
                if let Some(hit) = lookup(&route, &key).await {
                    counter!(METRIC_COALESCED).increment(1);
                    debug!(cache = "response", outcome = "coalesced", key = %key, "entry landed before leading");
                    return hit;
                }
                Some(guard)
            }
            Flight::Follower(waiter) => {
                wait_for_leader(waiter).await;
                if let Some(hit) = lookup(&route, &key).await {
                    counter!(METRIC_COALESCED).increment(1);
                    debug!(cache = "response", outcome = "coalesced", key = %key, "served leader's response");
                    return hit;
                }
                None
            }
        }
    } else {
        None
    };

    debug!(cache = "response", outcome = "miss", key = %key, "cache miss, executing handler");
    let response = next.run(request).await;
    store_response(&route, key, response, guard).await
}

async fn lookup(route: &CacheRoute, key: &CacheKey) -> Option<Response> {
    let cached: Value = route.context.store().get(key).await?;
    let exposed = route.expose_key().then_some(key);
    Some((StatusCode::OK, Json(annotate_hit(cached, exposed))).into_response())
}

/// Hand an eligible response to the store. The guard, if any, is released
/// only after the write completes.
async fn store_response(
    route: &CacheRoute,
    key: CacheKey,
    response: Response,
    guard: Option<FlightGuard>,
) -> Response {
    if response.status() != StatusCode::OK {
        skip("status");
        return response;
    }
    let declared = response.extensions().get::<CacheEligibility>().copied();
    if declared == Some(CacheEligibility::Skip) {
        skip("declared");
        return response;
    }

    let max_body_bytes = route.context.config().max_body_bytes;
    match response.body().size_hint().exact() {
        Some(size) if size <= max_body_bytes as u64 => {}
        _ => {
            skip("size");
            return response;
        }
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => return uncollected(parts, &key, &err),
    };

    let mut payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => {
            skip("not_json");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };
    if declared.is_none() && !body_allows_caching(&payload) {
        skip("unsuccessful");
        return Response::from_parts(parts, Body::from(bytes));
    }
    strip_annotations(&mut payload);

    let store = route.context.store().clone();
    let ttl = route.ttl;
    tokio::spawn(async move {
        if store.set(&key, &payload, Some(ttl)).await {
            counter!(METRIC_WRITE).increment(1);
            debug!(cache = "response", key = %key, ttl, "response cached");
        }
        drop(guard);
    });

    Response::from_parts(parts, Body::from(bytes))
}

/// The handler's body failed mid-stream. Nothing is cached and the handler's
/// status and headers go out unchanged; only the broken body is lost.
fn uncollected(mut parts: ResponseParts, key: &CacheKey, err: &axum::Error) -> Response {
    warn!(key = %key, error = %err, "response body could not be collected; not caching");
    skip("body_error");
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::empty())
}

fn skip(reason: &'static str) {
    counter!(METRIC_SKIP, "reason" => reason).increment(1);
}

/// Mark a response as never cacheable by clients or intermediaries.
pub async fn no_store(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{KeyBuilder, ResourceFamily};

    fn path_key(parts: &Parts) -> Option<CacheKey> {
        Some(
            KeyBuilder::new(ResourceFamily::Events, "test")
                .id(parts.uri.path())
                .finish(),
        )
    }

    fn counting_router(context: &CacheContext, calls: Arc<AtomicUsize>, body: Value) -> Router {
        let route = CacheRoute::new(context.clone(), path_key, 60);
        let handler = move || {
            let calls = calls.clone();
            let body = body.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Json(body)
            }
        };
        Router::new()
            .route("/items", get(handler.clone()).post(handler))
            .layer(from_fn_with_state(route, response_cache_layer))
    }

    async fn call(router: &Router, method: Method) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri("/items")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    async fn wait_for_write(context: &CacheContext) {
        let key = KeyBuilder::new(ResourceFamily::Events, "test").id("/items").finish();
        for _ in 0..100 {
            if context.store().get::<Value>(&key).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let context = CacheContext::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": true, "data": [1]}));

        let (status, first) = call(&router, Method::GET).await;
        assert_eq!(status, StatusCode::OK);
        assert!(first.get("fromCache").is_none());
        wait_for_write(&context).await;

        let (status, second) = call(&router, Method::GET).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["fromCache"], true);
        assert_eq!(second["data"], json!([1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_get_requests_bypass_the_cache() {
        let context = CacheContext::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": true}));

        call(&router, Method::POST).await;
        call(&router, Method::POST).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let key = KeyBuilder::new(ResourceFamily::Events, "test").id("/items").finish();
        assert!(context.store().get::<Value>(&key).await.is_none());
    }

    #[tokio::test]
    async fn unsuccessful_bodies_are_not_cached() {
        let context = CacheContext::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": false}));

        call(&router, Method::GET).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, second) = call(&router, Method::GET).await;
        assert!(second.get("fromCache").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_run_the_handler_once() {
        let context = CacheContext::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": true}));

        let (a, b) = tokio::join!(call(&router, Method::GET), call(&router, Method::GET));
        assert_eq!(a.0, StatusCode::OK);
        assert_eq!(b.0, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(context.flights().in_flight(), 0);
    }

    #[test]
    fn broken_body_keeps_the_handler_status() {
        let (parts, _) = (StatusCode::OK, Json(json!({"success": true})))
            .into_response()
            .into_parts();
        let key = KeyBuilder::new(ResourceFamily::Events, "test").id("/items").finish();
        let err = axum::Error::new(std::io::Error::other("connection reset"));

        let response = uncollected(parts, &key, &err);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    /// Misses on the first read only, as if a concurrent leader's write
    /// landed right after it.
    struct LateWriteBackend {
        inner: crate::cache::MemoryBackend,
        missed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::cache::CacheBackend for LateWriteBackend {
        fn name(&self) -> &'static str {
            "late-write"
        }
        async fn get(&self, key: &str) -> Result<Option<String>, crate::cache::BackendError> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get(key).await
        }
        async fn set_ex(
            &self,
            key: &str,
            value: String,
            ttl: u32,
        ) -> Result<(), crate::cache::BackendError> {
            self.inner.set_ex(key, value, ttl).await
        }
        async fn del(&self, keys: &[String]) -> Result<u64, crate::cache::BackendError> {
            self.inner.del(keys).await
        }
        async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, crate::cache::BackendError> {
            self.inner.scan_match(pattern).await
        }
        async fn incr(&self, key: &str) -> Result<i64, crate::cache::BackendError> {
            self.inner.incr(key).await
        }
        async fn expire(&self, key: &str, ttl: u32) -> Result<bool, crate::cache::BackendError> {
            self.inner.expire(key, ttl).await
        }
        async fn ping(&self) -> Result<(), crate::cache::BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_leader_rechecks_before_running_the_handler() {
        use crate::cache::CacheBackend;

        let backend = LateWriteBackend {
            inner: crate::cache::MemoryBackend::new(),
            missed: std::sync::atomic::AtomicBool::new(false),
        };
        let key = KeyBuilder::new(ResourceFamily::Events, "test").id("/items").finish();
        backend
            .inner
            .set_ex(key.as_str(), json!({"success": true, "data": [7]}).to_string(), 60)
            .await
            .expect("seed");
        let context = CacheContext::new(
            crate::cache::CacheStore::new(Arc::new(backend), 60),
            crate::cache::CacheConfig::default(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": true}));

        let (status, body) = call(&router, Method::GET).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fromCache"], true);
        assert_eq!(body["data"], json!([7]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.flights().in_flight(), 0);
    }

    #[tokio::test]
    async fn disabled_store_passes_through() {
        let context = CacheContext::new(
            crate::cache::CacheStore::disabled(),
            crate::cache::CacheConfig::default(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let router = counting_router(&context, calls.clone(), json!({"success": true}));

        let (status, _) = call(&router, Method::GET).await;
        let (_, second) = call(&router, Method::GET).await;
        assert_eq!(status, StatusCode::OK);
        assert!(second.get("fromCache").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_store_sets_headers() {
        let router = Router::new()
            .route("/export", get(|| async { "ok" }))
            .layer(from_fn(no_store));
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/export")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let headers = response.headers();
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate, private"
        );
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
    }
}
