//! Per-resource cache views and their invalidation rules.
//!
//! The key registry cannot know which views a write affects; these modules
//! encode it. Only the views enumerated by an `invalidate_*` function are
//! purged after a write. Any other view of the family may serve data up to its
//! TTL old.

mod athletes;
mod community;
mod events;
mod leaderboard;
mod venues;

pub use athletes::AthleteCache;
pub use community::CommunityCache;
pub use events::EventCache;
pub use leaderboard::LeaderboardCache;
pub use venues::VenueCache;

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::config::{TtlPolicy, TtlScale};
use super::keys::{CacheKey, KeyBuilder, KeyPattern, ResourceFamily};
use super::store::CacheStore;

/// Store access scoped to one resource family.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    family: ResourceFamily,
    store: CacheStore,
    ttl: TtlPolicy,
}

impl ResourceCache {
    pub fn new(family: ResourceFamily, store: CacheStore, ttl: TtlPolicy) -> Self {
        Self { family, store, ttl }
    }

    pub fn family(&self) -> ResourceFamily {
        self.family
    }

    pub fn key(&self, operation: &str) -> KeyBuilder {
        KeyBuilder::new(self.family, operation)
    }

    pub fn ttl(&self, scale: TtlScale) -> u32 {
        self.ttl.scaled(self.family, scale)
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        scale: TtlScale,
    ) -> bool {
        self.store.set(key, value, Some(self.ttl(scale))).await
    }

    pub async fn fetch<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.store.get(key).await
    }

    pub async fn invalidate_key(&self, key: &CacheKey) -> bool {
        debug!(family = %self.family, key = %key, "invalidating key");
        self.store.delete(key).await
    }

    /// Like [`invalidate_key`](Self::invalidate_key), counting only a key that
    /// existed.
    pub async fn remove_key(&self, key: &CacheKey) -> u64 {
        debug!(family = %self.family, key = %key, "removing key");
        self.store.remove(key).await
    }

    pub async fn invalidate_pattern(&self, pattern: &KeyPattern) -> u64 {
        self.store.delete_by_pattern(pattern).await
    }

    /// Sweep every key of the given operations.
    pub async fn invalidate_operations(&self, operations: &[&str]) -> u64 {
        let mut removed = 0;
        for operation in operations {
            removed += self
                .invalidate_pattern(&KeyPattern::operation(self.family, operation))
                .await;
        }
        debug!(family = %self.family, ?operations, removed, "invalidated views");
        removed
    }

    /// Sweep the whole family.
    pub async fn invalidate_family(&self) -> u64 {
        self.invalidate_pattern(&KeyPattern::family(self.family))
            .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::cache::{CacheStore, TtlPolicy};

    pub fn store() -> CacheStore {
        CacheStore::memory(300)
    }

    pub fn ttl() -> TtlPolicy {
        TtlPolicy::default()
    }
}
