use axum::extract::State;
use sportsbuddy_api_types::HealthView;

use crate::infra::http::api::error::ApiOk;
use crate::infra::http::api::state::ApiState;

/// Liveness plus cache reachability. An unreachable store is reported, not
/// treated as a failure.
pub async fn health(State(state): State<ApiState>) -> ApiOk<HealthView> {
    let cache_enabled = state.cache.store().ping().await;
    ApiOk::new(HealthView {
        status: "ok".to_string(),
        cache_enabled,
    })
}
