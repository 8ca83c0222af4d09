use std::sync::Arc;

use crate::application::events::EventService;
use crate::application::repos::{EventsRepo, VenuesRepo};
use crate::application::venues::VenueService;
use crate::cache::CacheContext;
use crate::config::RateLimitSettings;
use crate::infra::memory::{InMemoryEvents, InMemoryVenues};

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub cache: CacheContext,
    pub events: Arc<EventService>,
    pub venues: Arc<VenueService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl ApiState {
    pub fn new(
        cache: CacheContext,
        events: Arc<dyn EventsRepo>,
        venues: Arc<dyn VenuesRepo>,
        rate_limit: RateLimitSettings,
    ) -> Self {
        Self {
            events: Arc::new(EventService::new(events, cache.events().clone())),
            venues: Arc::new(VenueService::new(venues, cache.venues().clone())),
            rate_limiter: Arc::new(RateLimiter::new(cache.store().clone(), rate_limit)),
            cache,
        }
    }

    /// Process-local repositories over the given cache.
    pub fn in_memory(cache: CacheContext, rate_limit: RateLimitSettings) -> Self {
        Self::new(
            cache,
            Arc::new(InMemoryEvents::new()),
            Arc::new(InMemoryVenues::new()),
            rate_limit,
        )
    }
}
