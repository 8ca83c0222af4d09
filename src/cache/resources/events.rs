use std::fmt::Display;

use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::config::{TtlPolicy, TtlScale};
use crate::cache::keys::{CacheKey, Filters, ResourceFamily};
use crate::cache::store::CacheStore;

use super::ResourceCache;

const LIST: &str = "list";
const DETAIL: &str = "detail";
const FEATURED: &str = "featured";
const TRENDING: &str = "trending";
const SEARCH: &str = "search";
const USER: &str = "user";

/// Event views: list, detail, featured, trending, search, per-organizer.
///
/// `invalidate_event_caches` purges the event's detail, every list-style view
/// and the organizer's view. Nothing else in the family is tracked.
#[derive(Debug, Clone)]
pub struct EventCache {
    inner: ResourceCache,
}

impl EventCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self {
            inner: ResourceCache::new(ResourceFamily::Events, store, ttl),
        }
    }

    pub fn list_key(&self, page: u32, filters: &Filters) -> CacheKey {
        self.inner.key(LIST).page(page).filters(filters).finish()
    }

    pub fn detail_key(&self, id: impl Display) -> CacheKey {
        self.inner.key(DETAIL).id(id).finish()
    }

    pub fn featured_key(&self, limit: u32) -> CacheKey {
        self.inner.key(FEATURED).segment("limit", limit).finish()
    }

    pub fn trending_key(&self, limit: u32) -> CacheKey {
        self.inner.key(TRENDING).segment("limit", limit).finish()
    }

    pub fn search_key(&self, query: &str, page: u32) -> CacheKey {
        self.inner.key(SEARCH).search(query).page(page).finish()
    }

    pub fn user_key(&self, user_id: impl Display) -> CacheKey {
        self.inner.key(USER).id(user_id).finish()
    }

    pub fn list_ttl(&self) -> u32 {
        self.inner.ttl(TtlScale::Base)
    }

    pub fn detail_ttl(&self) -> u32 {
        self.inner.ttl(TtlScale::Detail)
    }

    pub fn search_ttl(&self) -> u32 {
        self.inner.ttl(TtlScale::Fresh)
    }

    pub async fn cache_events_list<T: Serialize + ?Sized>(
        &self,
        data: &T,
        page: u32,
        filters: &Filters,
    ) -> bool {
        self.inner
            .put(&self.list_key(page, filters), data, TtlScale::Base)
            .await
    }

    pub async fn get_events_list_from_cache<T: DeserializeOwned>(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Option<T> {
        self.inner.fetch(&self.list_key(page, filters)).await
    }

    pub async fn cache_event_detail<T: Serialize + ?Sized>(
        &self,
        id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.detail_key(id), data, TtlScale::Detail)
            .await
    }

    pub async fn get_event_detail_from_cache<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.detail_key(id)).await
    }

    pub async fn cache_featured_events<T: Serialize + ?Sized>(&self, data: &T, limit: u32) -> bool {
        self.inner
            .put(&self.featured_key(limit), data, TtlScale::Extended)
            .await
    }

    pub async fn get_featured_events_from_cache<T: DeserializeOwned>(
        &self,
        limit: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.featured_key(limit)).await
    }

    pub async fn cache_trending_events<T: Serialize + ?Sized>(&self, data: &T, limit: u32) -> bool {
        self.inner
            .put(&self.trending_key(limit), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_trending_events_from_cache<T: DeserializeOwned>(
        &self,
        limit: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.trending_key(limit)).await
    }

    pub async fn cache_event_search<T: Serialize + ?Sized>(
        &self,
        data: &T,
        query: &str,
        page: u32,
    ) -> bool {
        self.inner
            .put(&self.search_key(query, page), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_event_search_from_cache<T: DeserializeOwned>(
        &self,
        query: &str,
        page: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.search_key(query, page)).await
    }

    pub async fn cache_user_events<T: Serialize + ?Sized>(
        &self,
        user_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.user_key(user_id), data, TtlScale::Base)
            .await
    }

    pub async fn get_user_events_from_cache<T: DeserializeOwned>(
        &self,
        user_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.user_key(user_id)).await
    }

    pub async fn invalidate_event_detail(&self, id: impl Display) -> bool {
        self.inner.invalidate_key(&self.detail_key(id)).await
    }

    /// Sweep list, featured, trending and search views.
    pub async fn invalidate_event_lists(&self) -> u64 {
        self.inner
            .invalidate_operations(&[LIST, FEATURED, TRENDING, SEARCH])
            .await
    }

    pub async fn invalidate_user_events(&self, user_id: impl Display) -> bool {
        self.inner.invalidate_key(&self.user_key(user_id)).await
    }

    pub async fn invalidate_all_event_caches(&self) -> u64 {
        let removed = self.inner.invalidate_family().await;
        info!(removed, "all event caches invalidated");
        removed
    }

    /// Detail, lists and the organizer's view, after a create/update/delete.
    pub async fn invalidate_event_caches(
        &self,
        event_id: impl Display,
        organizer_id: impl Display,
    ) -> u64 {
        let mut removed = self.inner.remove_key(&self.detail_key(&event_id)).await;
        removed += self.invalidate_event_lists().await;
        removed += self.inner.remove_key(&self.user_key(&organizer_id)).await;
        info!(event_id = %event_id, organizer_id = %organizer_id, "event caches invalidated");
        removed
    }
}
