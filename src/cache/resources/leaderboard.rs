use std::fmt::Display;

use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::config::{TtlPolicy, TtlScale};
use crate::cache::keys::{CacheKey, Filters, ResourceFamily};
use crate::cache::store::CacheStore;

use super::ResourceCache;

const GLOBAL: &str = "global";
const RANK: &str = "rank";
const ACHIEVEMENTS: &str = "achievements";
const STREAKS: &str = "streaks";

/// Leaderboard views. Any score change moves every board, so board pages are
/// always swept as a whole.
#[derive(Debug, Clone)]
pub struct LeaderboardCache {
    inner: ResourceCache,
}

impl LeaderboardCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self {
            inner: ResourceCache::new(ResourceFamily::Leaderboard, store, ttl),
        }
    }

    pub fn global_key(&self, page: u32, filters: &Filters) -> CacheKey {
        self.inner.key(GLOBAL).page(page).filters(filters).finish()
    }

    pub fn rank_key(&self, user_id: impl Display) -> CacheKey {
        self.inner.key(RANK).id(user_id).finish()
    }

    pub fn achievements_key(&self, user_id: impl Display) -> CacheKey {
        self.inner.key(ACHIEVEMENTS).id(user_id).finish()
    }

    pub fn streaks_key(&self, user_id: impl Display) -> CacheKey {
        self.inner.key(STREAKS).id(user_id).finish()
    }

    pub async fn cache_global_leaderboard<T: Serialize + ?Sized>(
        &self,
        data: &T,
        page: u32,
        filters: &Filters,
    ) -> bool {
        self.inner
            .put(&self.global_key(page, filters), data, TtlScale::Base)
            .await
    }

    pub async fn get_global_leaderboard_from_cache<T: DeserializeOwned>(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Option<T> {
        self.inner.fetch(&self.global_key(page, filters)).await
    }

    pub async fn cache_user_rank<T: Serialize + ?Sized>(
        &self,
        user_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.rank_key(user_id), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_user_rank_from_cache<T: DeserializeOwned>(
        &self,
        user_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.rank_key(user_id)).await
    }

    pub async fn cache_user_achievements<T: Serialize + ?Sized>(
        &self,
        user_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.achievements_key(user_id), data, TtlScale::Extended)
            .await
    }

    pub async fn get_user_achievements_from_cache<T: DeserializeOwned>(
        &self,
        user_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.achievements_key(user_id)).await
    }

    pub async fn cache_user_streaks<T: Serialize + ?Sized>(
        &self,
        user_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.streaks_key(user_id), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_user_streaks_from_cache<T: DeserializeOwned>(
        &self,
        user_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.streaks_key(user_id)).await
    }

    /// Rank, achievements and streaks of one user.
    pub async fn invalidate_user_leaderboard(&self, user_id: impl Display) -> u64 {
        let mut removed = 0;
        for key in [
            self.rank_key(&user_id),
            self.achievements_key(&user_id),
            self.streaks_key(&user_id),
        ] {
            removed += self.inner.remove_key(&key).await;
        }
        removed
    }

    /// Every page of every board.
    pub async fn invalidate_leaderboards(&self) -> u64 {
        self.inner.invalidate_operations(&[GLOBAL]).await
    }

    pub async fn invalidate_all_leaderboard_caches(&self) -> u64 {
        let removed = self.inner.invalidate_family().await;
        info!(removed, "all leaderboard caches invalidated");
        removed
    }

    pub async fn invalidate_leaderboard_caches(&self, user_id: impl Display) -> u64 {
        let removed =
            self.invalidate_user_leaderboard(&user_id).await + self.invalidate_leaderboards().await;
        info!(user_id = %user_id, "leaderboard caches invalidated");
        removed
    }
}
