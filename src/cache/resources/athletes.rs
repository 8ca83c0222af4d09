use std::fmt::Display;

use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::config::{TtlPolicy, TtlScale};
use crate::cache::keys::{CacheKey, Filters, ResourceFamily};
use crate::cache::store::CacheStore;

use super::ResourceCache;

const LIST: &str = "list";
const PROFILE: &str = "profile";
const SEARCH: &str = "search";
const ACHIEVEMENTS: &str = "achievements";
const FEATURED: &str = "featured";

/// Athlete views. Profiles and achievements are keyed by the athlete id and
/// dropped together.
#[derive(Debug, Clone)]
pub struct AthleteCache {
    inner: ResourceCache,
}

impl AthleteCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self {
            inner: ResourceCache::new(ResourceFamily::Athletes, store, ttl),
        }
    }

    pub fn list_key(&self, page: u32, filters: &Filters) -> CacheKey {
        self.inner.key(LIST).page(page).filters(filters).finish()
    }

    pub fn profile_key(&self, id: impl Display) -> CacheKey {
        self.inner.key(PROFILE).id(id).finish()
    }

    pub fn search_key(&self, query: &str, page: u32) -> CacheKey {
        self.inner.key(SEARCH).search(query).page(page).finish()
    }

    pub fn achievements_key(&self, id: impl Display) -> CacheKey {
        self.inner.key(ACHIEVEMENTS).id(id).finish()
    }

    pub fn featured_key(&self) -> CacheKey {
        self.inner.key(FEATURED).finish()
    }

    pub async fn cache_athletes_list<T: Serialize + ?Sized>(
        &self,
        data: &T,
        page: u32,
        filters: &Filters,
    ) -> bool {
        self.inner
            .put(&self.list_key(page, filters), data, TtlScale::Base)
            .await
    }

    pub async fn get_athletes_list_from_cache<T: DeserializeOwned>(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Option<T> {
        self.inner.fetch(&self.list_key(page, filters)).await
    }

    pub async fn cache_athlete_profile<T: Serialize + ?Sized>(
        &self,
        id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.profile_key(id), data, TtlScale::Detail)
            .await
    }

    pub async fn get_athlete_profile_from_cache<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.profile_key(id)).await
    }

    pub async fn cache_athlete_search<T: Serialize + ?Sized>(
        &self,
        data: &T,
        query: &str,
        page: u32,
    ) -> bool {
        self.inner
            .put(&self.search_key(query, page), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_athlete_search_from_cache<T: DeserializeOwned>(
        &self,
        query: &str,
        page: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.search_key(query, page)).await
    }

    pub async fn cache_athlete_achievements<T: Serialize + ?Sized>(
        &self,
        id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.achievements_key(id), data, TtlScale::Extended)
            .await
    }

    pub async fn get_athlete_achievements_from_cache<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.achievements_key(id)).await
    }

    pub async fn cache_featured_athletes<T: Serialize + ?Sized>(&self, data: &T) -> bool {
        self.inner
            .put(&self.featured_key(), data, TtlScale::Extended)
            .await
    }

    pub async fn get_featured_athletes_from_cache<T: DeserializeOwned>(&self) -> Option<T> {
        self.inner.fetch(&self.featured_key()).await
    }

    /// Profile and achievements of one athlete.
    pub async fn invalidate_athlete_detail(&self, id: impl Display) -> u64 {
        self.inner.remove_key(&self.profile_key(&id)).await
            + self.inner.remove_key(&self.achievements_key(&id)).await
    }

    /// Sweep list, search and featured views.
    pub async fn invalidate_athlete_lists(&self) -> u64 {
        self.inner
            .invalidate_operations(&[LIST, SEARCH, FEATURED])
            .await
    }

    pub async fn invalidate_all_athlete_caches(&self) -> u64 {
        let removed = self.inner.invalidate_family().await;
        info!(removed, "all athlete caches invalidated");
        removed
    }

    pub async fn invalidate_athlete_caches(&self, athlete_id: impl Display) -> u64 {
        let removed =
            self.invalidate_athlete_detail(&athlete_id).await + self.invalidate_athlete_lists().await;
        info!(athlete_id = %athlete_id, "athlete caches invalidated");
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::resources::test_support::{store, ttl};

    #[tokio::test]
    async fn achievements_live_three_times_the_base_ttl() {
        let athletes = AthleteCache::new(store(), ttl());
        assert_eq!(athletes.inner.ttl(TtlScale::Extended), 1800);
        assert_eq!(athletes.featured_key().as_str(), "athletes:featured:all");
    }

    #[tokio::test]
    async fn athlete_invalidation_drops_profile_achievements_and_lists() {
        let athletes = AthleteCache::new(store(), ttl());
        athletes.cache_athlete_profile("a1", &json!({"name": "Rosa"})).await;
        athletes.cache_athlete_achievements("a1", &json!(["gold"])).await;
        athletes.cache_athlete_profile("a2", &json!({"name": "Ines"})).await;
        athletes.cache_featured_athletes(&json!(["a1"])).await;
        athletes
            .cache_athletes_list(&json!([]), 1, &Filters::new().with("sport", "Running"))
            .await;

        assert_eq!(athletes.invalidate_athlete_caches("a1").await, 4);
        assert!(
            athletes
                .get_athlete_achievements_from_cache::<Value>("a1")
                .await
                .is_none()
        );
        assert!(athletes.get_featured_athletes_from_cache::<Value>().await.is_none());
        assert!(
            athletes
                .get_athlete_profile_from_cache::<Value>("a2")
                .await
                .is_some()
        );
    }
}
