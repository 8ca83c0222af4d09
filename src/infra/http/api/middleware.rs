use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::rate_limit::{RateLimitClass, RateLimitDecision, RateLimiter};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
const ANONYMOUS_CLIENT: &str = "anonymous";

/// State for one rate-limited route group.
#[derive(Debug, Clone)]
pub struct RateLimitRoute {
    limiter: Arc<RateLimiter>,
    class: RateLimitClass,
}

impl RateLimitRoute {
    pub fn new(limiter: Arc<RateLimiter>, class: RateLimitClass) -> Self {
        Self { limiter, class }
    }
}

/// Nested classes each count the request; the innermost class owns the
/// `X-RateLimit-*` headers.
pub async fn api_rate_limit(
    State(route): State<RateLimitRoute>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !route.limiter.is_active() {
        return next.run(request).await;
    }

    let client = client_id(&request, route.limiter.trusted_proxy_hops());
    let decision = route.limiter.check(route.class, &client).await;
    if !decision.allowed {
        let mut response =
            ApiError::rate_limited(decision.limit, decision.reset_ms, decision.retry_after);
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let values = [
        (X_RATELIMIT_LIMIT, u64::from(decision.limit)),
        (X_RATELIMIT_REMAINING, u64::from(decision.remaining)),
        (X_RATELIMIT_RESET, decision.reset_ms),
    ];
    for (name, value) in values {
        headers
            .entry(name)
            .or_insert_with(|| HeaderValue::from(value));
    }
}

/// Rate-limit identity of the caller.
///
/// With no trusted proxies the socket peer is the client and
/// `X-Forwarded-For` is ignored. With `trusted_hops` proxies in front, each
/// appending the address it saw, the client is the right-most entry that no
/// trusted proxy wrote.
pub fn client_id<B>(request: &Request<B>, trusted_hops: u32) -> String {
    if trusted_hops > 0
        && let Some(forwarded) = forwarded_client(request.headers(), trusted_hops)
    {
        return forwarded;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

fn forwarded_client(headers: &HeaderMap, trusted_hops: u32) -> Option<String> {
    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();
    let from_right = usize::try_from(trusted_hops).unwrap_or(usize::MAX);
    // a chain shorter than the trusted hops was started by the first proxy
    let index = hops.len().saturating_sub(from_right);
    hops.get(index).map(|hop| (*hop).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request<()> {
        let mut builder = Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header(X_FORWARDED_FOR, forwarded);
        }
        let mut request = builder.body(()).expect("request");
        let addr: SocketAddr = peer.parse().expect("addr");
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn forwarded_header_is_ignored_without_trusted_proxies() {
        let request = request_from("198.51.100.9:4000", Some("10.0.0.1"));
        assert_eq!(client_id(&request, 0), "198.51.100.9");
    }

    #[test]
    fn trusted_hops_pick_the_right_most_untrusted_entry() {
        let request = request_from(
            "10.0.0.2:4000",
            Some("6.6.6.6, 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_id(&request, 1), "10.0.0.1");
        assert_eq!(client_id(&request, 2), "203.0.113.7");
        assert_eq!(client_id(&request, 5), "6.6.6.6");
    }

    #[test]
    fn missing_header_falls_back_to_peer_then_anonymous() {
        let request = request_from("192.0.2.10:4242", None);
        assert_eq!(client_id(&request, 1), "192.0.2.10");

        let request = Request::builder().body(()).expect("request");
        assert_eq!(client_id(&request, 0), ANONYMOUS_CLIENT);
    }

    #[test]
    fn existing_headers_are_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from_static("30"));
        let decision = RateLimitDecision {
            allowed: true,
            limit: 1000,
            remaining: 999,
            reset_ms: 1,
            retry_after: 1,
        };
        apply_headers(&mut headers, &decision);
        assert_eq!(headers[X_RATELIMIT_LIMIT], "30");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "999");
    }
}
