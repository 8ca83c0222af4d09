//! Process-wide cache context.
//!
//! Built once at startup and cloned into the router state, the middleware and
//! every service. All clones share one store client and one single-flight map.

use crate::config::Settings;

use super::config::CacheConfig;
use super::flight::SingleFlight;
use super::resources::{AthleteCache, CommunityCache, EventCache, LeaderboardCache, VenueCache};
use super::store::CacheStore;

#[derive(Debug, Clone)]
pub struct CacheContext {
    store: CacheStore,
    config: CacheConfig,
    flights: SingleFlight,
    events: EventCache,
    venues: VenueCache,
    athletes: AthleteCache,
    community: CommunityCache,
    leaderboard: LeaderboardCache,
}

impl CacheContext {
    pub fn new(store: CacheStore, config: CacheConfig) -> Self {
        let ttl = &config.ttl;
        Self {
            events: EventCache::new(store.clone(), ttl.clone()),
            venues: VenueCache::new(store.clone(), ttl.clone()),
            athletes: AthleteCache::new(store.clone(), ttl.clone()),
            community: CommunityCache::new(store.clone(), ttl.clone()),
            leaderboard: LeaderboardCache::new(store.clone(), ttl.clone()),
            flights: SingleFlight::new(),
            store,
            config,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let config = CacheConfig::from(settings);
        let store = CacheStore::from_settings(&settings.store, config.ttl.default_ttl());
        Self::new(store, config)
    }

    /// In-memory store with default configuration.
    pub fn in_memory() -> Self {
        let config = CacheConfig::default();
        Self::new(CacheStore::memory(config.ttl.default_ttl()), config)
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn flights(&self) -> &SingleFlight {
        &self.flights
    }

    pub fn events(&self) -> &EventCache {
        &self.events
    }

    pub fn venues(&self) -> &VenueCache {
        &self.venues
    }

    pub fn athletes(&self) -> &AthleteCache {
        &self.athletes
    }

    pub fn community(&self) -> &CommunityCache {
        &self.community
    }

    pub fn leaderboard(&self) -> &LeaderboardCache {
        &self.leaderboard
    }
}
