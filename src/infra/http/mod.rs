//! HTTP surface: the API router wrapped in request bookkeeping.

pub mod api;
mod middleware;

pub use api::ApiState;
pub use api::rate_limit::{RateLimitClass, RateLimitDecision, RateLimiter};
pub use middleware::RequestContext;

use axum::{Router, middleware as axum_middleware};

use self::middleware::{log_responses, set_request_context};

/// Complete application router. `set_request_context` runs first so every
/// logged failure carries a request id.
pub fn build_router(state: ApiState) -> Router {
    let trusted_hops = state.rate_limiter.trusted_proxy_hops();
    api::build_api_router(state)
        .layer(axum_middleware::from_fn_with_state(
            trusted_hops,
            log_responses,
        ))
        .layer(axum_middleware::from_fn(set_request_context))
}
