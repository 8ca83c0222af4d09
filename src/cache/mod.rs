//! SportsBuddy response cache.
//!
//! A read-through cache for JSON API responses, kept in a Redis-compatible
//! store:
//!
//! - **Keys** ([`keys`]): deterministic keys and invalidation patterns from one
//!   builder.
//! - **Store** ([`CacheStore`]): failure-safe adapter over a [`CacheBackend`];
//!   a broken store behaves like an empty one.
//! - **Middleware** ([`response_cache_layer`]): serves hits, stores eligible
//!   misses, coalesces concurrent misses.
//! - **Resources** ([`EventCache`] and friends): typed views and the
//!   invalidation rules run after writes.
//!
//! ## Configuration
//!
//! ```toml
//! [store]
//! backend = "upstash"   # or "memory" / "disabled"
//! timeout_ms = 2000
//!
//! [cache]
//! single_flight = true
//! [cache.ttl]
//! events = 300
//! venues = 900
//! ```

mod backend;
mod config;
mod context;
mod envelope;
mod flight;
pub mod keys;
mod memory;
mod middleware;
mod resources;
mod store;
mod upstash;

pub use backend::{BackendError, CacheBackend};
pub use config::{CacheConfig, TtlPolicy, TtlScale};
pub(crate) use config::{
    DEFAULT_ADMIN_TTL, DEFAULT_ATHLETES_TTL, DEFAULT_COMMUNITY_TTL, DEFAULT_EVENTS_TTL,
    DEFAULT_LEADERBOARD_TTL, DEFAULT_TTL, DEFAULT_VENUES_TTL,
};
pub use context::CacheContext;
pub use envelope::{CACHE_KEY_FIELD, CacheEligibility, FROM_CACHE_FIELD};
pub use flight::{Flight, FlightGuard, SingleFlight};
pub use keys::{CacheKey, Filters, KeyBuilder, KeyParams, KeyPattern, ResourceFamily, build_key};
pub use memory::MemoryBackend;
pub use middleware::{CacheRoute, no_store, response_cache_layer};
pub use resources::{
    AthleteCache, CommunityCache, EventCache, LeaderboardCache, ResourceCache, VenueCache,
};
pub use store::CacheStore;
pub use upstash::{UpstashBackend, UpstashConfig};
