use std::fmt::Display;

use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::config::{TtlPolicy, TtlScale};
use crate::cache::keys::{CacheKey, Filters, KeyPattern, ResourceFamily};
use crate::cache::store::CacheStore;

use super::ResourceCache;

const LIST: &str = "list";
const DETAIL: &str = "detail";
const POSTS: &str = "posts";
const POST: &str = "post";
const COMMENTS: &str = "comments";
const TRENDING: &str = "trending";
const USER: &str = "user";

/// Community views: communities, their posts and comments, trending, and the
/// communities a user belongs to.
#[derive(Debug, Clone)]
pub struct CommunityCache {
    inner: ResourceCache,
}

impl CommunityCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self {
            inner: ResourceCache::new(ResourceFamily::Community, store, ttl),
        }
    }

    pub fn list_key(&self, page: u32, filters: &Filters) -> CacheKey {
        self.inner.key(LIST).page(page).filters(filters).finish()
    }

    pub fn detail_key(&self, id: impl Display) -> CacheKey {
        self.inner.key(DETAIL).id(id).finish()
    }

    pub fn posts_key(&self, community_id: impl Display, page: u32) -> CacheKey {
        self.inner.key(POSTS).id(community_id).page(page).finish()
    }

    fn posts_pattern(&self, community_id: impl Display) -> KeyPattern {
        self.inner.key(POSTS).id(community_id).pattern()
    }

    pub fn post_key(&self, post_id: impl Display) -> CacheKey {
        self.inner.key(POST).id(post_id).finish()
    }

    pub fn comments_key(&self, post_id: impl Display, page: u32) -> CacheKey {
        self.inner.key(COMMENTS).id(post_id).page(page).finish()
    }

    fn comments_pattern(&self, post_id: impl Display) -> KeyPattern {
        self.inner.key(COMMENTS).id(post_id).pattern()
    }

    pub fn trending_key(&self) -> CacheKey {
        self.inner.key(TRENDING).finish()
    }

    pub fn user_key(&self, user_id: impl Display) -> CacheKey {
        self.inner.key(USER).id(user_id).finish()
    }

    pub async fn cache_communities_list<T: Serialize + ?Sized>(
        &self,
        data: &T,
        page: u32,
        filters: &Filters,
    ) -> bool {
        self.inner
            .put(&self.list_key(page, filters), data, TtlScale::Base)
            .await
    }

    pub async fn get_communities_list_from_cache<T: DeserializeOwned>(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Option<T> {
        self.inner.fetch(&self.list_key(page, filters)).await
    }

    pub async fn cache_community_detail<T: Serialize + ?Sized>(
        &self,
        id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.detail_key(id), data, TtlScale::Detail)
            .await
    }

    pub async fn get_community_detail_from_cache<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.detail_key(id)).await
    }

    pub async fn cache_community_posts<T: Serialize + ?Sized>(
        &self,
        community_id: impl Display,
        page: u32,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.posts_key(community_id, page), data, TtlScale::Base)
            .await
    }

    pub async fn get_community_posts_from_cache<T: DeserializeOwned>(
        &self,
        community_id: impl Display,
        page: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.posts_key(community_id, page)).await
    }

    pub async fn cache_post_detail<T: Serialize + ?Sized>(
        &self,
        post_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.post_key(post_id), data, TtlScale::Detail)
            .await
    }

    pub async fn get_post_detail_from_cache<T: DeserializeOwned>(
        &self,
        post_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.post_key(post_id)).await
    }

    pub async fn cache_post_comments<T: Serialize + ?Sized>(
        &self,
        post_id: impl Display,
        page: u32,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.comments_key(post_id, page), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_post_comments_from_cache<T: DeserializeOwned>(
        &self,
        post_id: impl Display,
        page: u32,
    ) -> Option<T> {
        self.inner.fetch(&self.comments_key(post_id, page)).await
    }

    pub async fn cache_trending_posts<T: Serialize + ?Sized>(&self, data: &T) -> bool {
        self.inner
            .put(&self.trending_key(), data, TtlScale::Fresh)
            .await
    }

    pub async fn get_trending_posts_from_cache<T: DeserializeOwned>(&self) -> Option<T> {
        self.inner.fetch(&self.trending_key()).await
    }

    pub async fn cache_user_communities<T: Serialize + ?Sized>(
        &self,
        user_id: impl Display,
        data: &T,
    ) -> bool {
        self.inner
            .put(&self.user_key(user_id), data, TtlScale::Base)
            .await
    }

    pub async fn get_user_communities_from_cache<T: DeserializeOwned>(
        &self,
        user_id: impl Display,
    ) -> Option<T> {
        self.inner.fetch(&self.user_key(user_id)).await
    }

    pub async fn invalidate_community_detail(&self, id: impl Display) -> bool {
        self.inner.invalidate_key(&self.detail_key(id)).await
    }

    /// Sweep community lists and trending posts.
    pub async fn invalidate_community_lists(&self) -> u64 {
        self.inner.invalidate_operations(&[LIST, TRENDING]).await
    }

    /// Every page of one community's post list.
    pub async fn invalidate_community_posts(&self, community_id: impl Display) -> u64 {
        self.inner
            .invalidate_pattern(&self.posts_pattern(community_id))
            .await
    }

    /// A post, its comment pages, its community's post pages and trending.
    pub async fn invalidate_post_caches(
        &self,
        community_id: impl Display,
        post_id: impl Display,
    ) -> u64 {
        let mut removed = self.inner.remove_key(&self.post_key(&post_id)).await;
        removed += self
            .inner
            .invalidate_pattern(&self.comments_pattern(&post_id))
            .await;
        removed += self.invalidate_community_posts(&community_id).await;
        removed += self.inner.invalidate_operations(&[TRENDING]).await;
        info!(community_id = %community_id, post_id = %post_id, "post caches invalidated");
        removed
    }

    pub async fn invalidate_user_communities(&self, user_id: impl Display) -> bool {
        self.inner.invalidate_key(&self.user_key(user_id)).await
    }

    pub async fn invalidate_all_community_caches(&self) -> u64 {
        let removed = self.inner.invalidate_family().await;
        info!(removed, "all community caches invalidated");
        removed
    }

    /// Detail, lists and the member's view, after a community write or a
    /// membership change.
    pub async fn invalidate_community_caches(
        &self,
        community_id: impl Display,
        user_id: impl Display,
    ) -> u64 {
        let mut removed = self.inner.remove_key(&self.detail_key(&community_id)).await;
        removed += self.invalidate_community_lists().await;
        removed += self.inner.remove_key(&self.user_key(&user_id)).await;
        info!(community_id = %community_id, user_id = %user_id, "community caches invalidated");
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::resources::test_support::{store, ttl};

    #[test]
    fn comments_use_half_ttl() {
        let community = CommunityCache::new(store(), ttl());
        assert_eq!(community.inner.ttl(TtlScale::Fresh), 60);
        assert_eq!(
            community.comments_key("p1", 3).as_str(),
            "community:comments:p1:page:3"
        );
    }

    #[tokio::test]
    async fn post_invalidation_is_scoped_to_its_community() {
        let community = CommunityCache::new(store(), ttl());
        community.cache_community_posts("c1", 1, &json!([1])).await;
        community.cache_community_posts("c1", 2, &json!([2])).await;
        community.cache_community_posts("c2", 1, &json!([3])).await;
        community.cache_post_detail("p1", &json!({"id": "p1"})).await;
        community.cache_post_comments("p1", 1, &json!([])).await;
        community.cache_trending_posts(&json!(["p1"])).await;

        assert_eq!(community.invalidate_post_caches("c1", "p1").await, 5);
        assert!(
            community
                .get_community_posts_from_cache::<Value>("c1", 2)
                .await
                .is_none()
        );
        assert!(
            community
                .get_community_posts_from_cache::<Value>("c2", 1)
                .await
                .is_some()
        );
        assert!(community.get_trending_posts_from_cache::<Value>().await.is_none());
    }

    #[tokio::test]
    async fn nothing_cached_reports_nothing_removed() {
        let community = CommunityCache::new(store(), ttl());
        assert_eq!(community.invalidate_community_caches("c1", "u1").await, 0);
        assert_eq!(community.invalidate_post_caches("c1", "p1").await, 0);
    }

    #[tokio::test]
    async fn membership_change_drops_member_view() {
        let community = CommunityCache::new(store(), ttl());
        community.cache_community_detail("c1", &json!({"members": 3})).await;
        community.cache_user_communities("u1", &json!(["c1"])).await;
        community
            .cache_communities_list(&json!([]), 1, &Filters::new())
            .await;

        assert_eq!(community.invalidate_community_caches("c1", "u1").await, 3);
        assert!(
            community
                .get_user_communities_from_cache::<Value>("u1")
                .await
                .is_none()
        );
    }
}
