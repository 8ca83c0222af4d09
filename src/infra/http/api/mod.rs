pub mod cache_keys;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::cache::{CacheRoute, no_store, response_cache_layer};

use self::handlers::{admin, events, health, venues};
use self::middleware::{RateLimitRoute, api_rate_limit};
use self::rate_limit::RateLimitClass;

/// Every route of the API. `Global` limits everything except `/health`.
pub fn build_api_router(state: ApiState) -> Router {
    let cache = state.cache.clone();
    let limiter = state.rate_limiter.clone();
    let event_cache = cache.events().clone();
    let venue_cache = cache.venues().clone();

    let cached = |route: CacheRoute| axum_middleware::from_fn_with_state(route, response_cache_layer);
    let limited = |class: RateLimitClass| {
        axum_middleware::from_fn_with_state(
            RateLimitRoute::new(Arc::clone(&limiter), class),
            api_rate_limit,
        )
    };

    let search = Router::new()
        .route(
            "/api/events/search",
            get(events::search_events).layer(cached(CacheRoute::new(
                cache.clone(),
                cache_keys::event_search(event_cache.clone()),
                event_cache.search_ttl(),
            ))),
        )
        .route(
            "/api/venues/search",
            get(venues::search_venues).layer(cached(CacheRoute::new(
                cache.clone(),
                cache_keys::venue_search(venue_cache.clone()),
                venue_cache.search_ttl(),
            ))),
        )
        .layer(limited(RateLimitClass::Search));

    let resources = Router::new()
        .route(
            "/api/events",
            get(events::list_events)
                .layer(cached(CacheRoute::new(
                    cache.clone(),
                    cache_keys::event_list(event_cache.clone()),
                    event_cache.list_ttl(),
                )))
                .post(events::create_event),
        )
        .route(
            "/api/events/{id}",
            get(events::get_event)
                .layer(cached(CacheRoute::new(
                    cache.clone(),
                    cache_keys::event_detail(event_cache.clone()),
                    event_cache.detail_ttl(),
                )))
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/api/venues",
            get(venues::list_venues)
                .layer(cached(CacheRoute::new(
                    cache.clone(),
                    cache_keys::venue_list(venue_cache.clone()),
                    venue_cache.list_ttl(),
                )))
                .post(venues::create_venue),
        )
        .route(
            "/api/venues/{id}",
            get(venues::get_venue)
                .layer(cached(CacheRoute::new(
                    cache.clone(),
                    cache_keys::venue_detail(venue_cache.clone()),
                    venue_cache.detail_ttl(),
                )))
                .put(venues::update_venue)
                .delete(venues::delete_venue),
        )
        .merge(search)
        .layer(limited(RateLimitClass::Api));

    let admin = Router::new()
        .route(
            "/api/admin/events/export",
            get(admin::export_events).layer(axum_middleware::from_fn(no_store)),
        )
        .route("/api/admin/cache/flush/{family}", post(admin::flush_family))
        .layer(limited(RateLimitClass::Admin));

    Router::new()
        .merge(resources)
        .merge(admin)
        .layer(limited(RateLimitClass::Global))
        .route("/health", get(health::health))
        .with_state(state)
}
