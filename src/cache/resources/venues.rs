use std::fmt::Display;

use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::config::{TtlPolicy, TtlScale};
use crate::cache::keys::{CacheKey, Filters, ResourceFamily};
use crate::cache::store::CacheStore;

use super::ResourceCache;

const LIST: &str = "list";
const DETAIL: &str = "detail";
const SEARCH: &str = "search";
const NEARBY: &str = "nearby";
const OWNER: &str = "owner";

/// Venue views: list, detail, search, nearby and per-owner.
#[derive(Debug, Clone)]
pub struct VenueCache {
    inner: ResourceCache,
}

impl VenueCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self {
            inner: ResourceCache::new(ResourceFamily::Venues, store, ttl),
        }
    }

    pub fn list_key(&self, page: u32, filters: &Filters) -> CacheKey {
        self.inner.key(LIST).page(page).filters(filters).finish()
    }

    pub fn detail_key(&self, id: impl Display) -> CacheKey {
        self.inner.key(DETAIL).id(id).finish()
    }

    pub fn search_key(&self, query: &str, page: u32) -> CacheKey {
        self.inner.key(SEARCH).search(query).page(page).finish()
    }

    /// Coordinates are rounded to four decimals (about 11 m) so jittery
    /// client positions share an entry.
    pub fn nearby_key(&self, lat: f64, lng: f64, radius_km: u32) -> CacheKey {
        self.inner
            .key(NEARBY)
            .segment("lat", format!("{lat:.4}"))
            .segment("lng", format!("{lng:.4}"))
            .segment("r", radius_km)
            .finish()
    }

    pub fn owner_key(&self, owner_id: impl Display) -> CacheKey {
        self.inner.key(OWNER).id(owner_id).finish()
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

    pub async fn cache_venues_list<T: Serialize + ?Sized>(
        &self,
        data: &T,
        page: u32,
        filters: &Filters,
    ) -> bool {
        self.inner
            .put(&self.list_key(page, filters), data, TtlScale::Base)
            .await
    }

    pub async fn get_venues_list_from_cache<T: DeserializeOwned>(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Option<T> {
        self.inner.fetch(&self.list_key(page, filters)).await
    }

    pub async fn cache_venue_detail<T: Serialize + ?Sized>(
        &self,
        id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.detail_key(id), data, TtlScale::Detail)
            .await
    }

    pub async fn get_venue_detail_from_cache<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.detail_key(id)).await
    }

    pub async fn cache_venue_search<T: Serialize + ?Sized>(
        &self,
        data: &T,
        query: &str,
        page: u32,
    ) -> bool {
        self.inner
            .put(&self.search_key(query, page), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_venue_search_from_cache<T: DeserializeOwned>(
        &self,
        query: &str,
        page: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.search_key(query, page)).await
    }

    pub async fn cache_nearby_venues<T: Serialize + ?Sized>(
        &self,
        data: &T,
        lat: f64,
        lng: f64,
        radius_km: u32,
    ) -> bool {
        self.inner
            .put(&self.nearby_key(lat, lng, radius_km), data, TtlScale::Base)
            .await
    }

    pub async fn get_nearby_venues_from_cache<T: DeserializeOwned>(
        &self,
        lat: f64,
        lng: f64,
        radius_km: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.nearby_key(lat, lng, radius_km)).await
    }

    pub async fn cache_owner_venues<T: Serialize + ?Sized>(
        &self,
        owner_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.owner_key(owner_id), data, TtlScale::Base)
            .await
    }

    pub async fn get_owner_venues_from_cache<T: DeserializeOwned>(
        &self,
        owner_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.owner_key(owner_id)).await
    }

    pub async fn invalidate_venue_detail(&self, id: impl Display) -> bool {
        self.inner.invalidate_key(&self.detail_key(id)).await
    }

    /// Sweep list, search and nearby views.
    pub async fn invalidate_venue_lists(&self) -> u64 {
        self.inner
            .invalidate_operations(&[LIST, SEARCH, NEARBY])
            .await
    }

    pub async fn invalidate_owner_venues(&self, owner_id: impl Display) -> bool {
        self.inner.invalidate_key(&self.owner_key(owner_id)).await
    }

    pub async fn invalidate_all_venue_caches(&self) -> u64 {
        let removed = self.inner.invalidate_family().await;
        info!(removed, "all venue caches invalidated");
        removed
    }

    pub async fn invalidate_venue_caches(
        &self,
        venue_id: impl Display,
        owner_id: impl Display,
    ) -> u64 {
        let mut removed = self.inner.remove_key(&self.detail_key(&venue_id)).await;
        removed += self.invalidate_venue_lists().await;
        removed += self.inner.remove_key(&self.owner_key(&owner_id)).await;
        info!(venue_id = %venue_id, owner_id = %owner_id, "venue caches invalidated");
        removed
    }
}
