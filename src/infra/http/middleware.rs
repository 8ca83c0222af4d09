use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::api::middleware::client_id;

const X_REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse an upstream request id when it is a sane header value, otherwise
/// mint one. The id is echoed on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_REQUEST_ID), value);
    }
    response
}

/// One log line per request; failures carry the report attached by the
/// handler or the rate limiter. The state is the trusted proxy hop count, so
/// the logged client matches the one the limiter keys on.
pub async fn log_responses(
    State(trusted_hops): State<u32>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let client = client_id(&request, trusted_hops);
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        if response.status().is_server_error() {
            error!(
                target = "sportsbuddy::http::response",
                status, %method, path, elapsed_ms, request_id, client,
                "request failed without a diagnostic"
            );
        } else {
            debug!(
                target = "sportsbuddy::http::response",
                status, %method, path, elapsed_ms, request_id, client,
                "request completed"
            );
        }
        return response;
    };

    let detail = report.messages.first().map(String::as_str).unwrap_or("");
    if report.status.is_server_error() {
        error!(
            target = "sportsbuddy::http::response",
            status, %method, path, elapsed_ms, request_id, client,
            source = report.source,
            detail,
            chain = ?report.messages,
            "request failed"
        );
    } else {
        warn!(
            target = "sportsbuddy::http::response",
            status, %method, path, elapsed_ms, request_id, client,
            source = report.source,
            detail,
            "request rejected"
        );
    }

    response
}
