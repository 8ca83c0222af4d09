use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{RepoError, VenueQueryFilter, VenuesRepo};
use crate::cache::VenueCache;
use crate::domain::entities::{VenueDraft, VenueRecord};

const ENTITY: &str = "venue";

#[derive(Clone)]
pub struct VenueService {
    repo: Arc<dyn VenuesRepo>,
    cache: VenueCache,
}

impl VenueService {
    pub fn new(repo: Arc<dyn VenuesRepo>, cache: VenueCache) -> Self {
        Self { repo, cache }
    }

    pub async fn list(
        &self,
        filter: &VenueQueryFilter,
        page: PageRequest,
    ) -> Result<Page<VenueRecord>, AppError> {
        Ok(self.repo.list_venues(filter, page).await?)
    }

    pub async fn search(&self, term: &str, page: PageRequest) -> Result<Page<VenueRecord>, AppError> {
        Ok(self.repo.search_venues(term.trim(), page).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<VenueRecord, AppError> {
        self.repo
            .find_venue(id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))
    }

    pub async fn create(&self, draft: VenueDraft) -> Result<VenueRecord, AppError> {
        let venue = self.repo.create_venue(draft.normalized()?).await?;
        self.cache.invalidate_venue_caches(venue.id, venue.owner_id).await;
        info!(venue_id = %venue.id, "venue created");
        Ok(venue)
    }

    pub async fn update(&self, id: Uuid, draft: VenueDraft) -> Result<VenueRecord, AppError> {
        let draft = draft.normalized()?;
        let previous = self.get(id).await?;
        let venue = self
            .repo
            .update_venue(id, draft)
            .await
            .map_err(|err| not_found_or(err, id))?;

        self.cache.invalidate_venue_caches(venue.id, venue.owner_id).await;
        if previous.owner_id != venue.owner_id {
            self.cache.invalidate_owner_venues(previous.owner_id).await;
        }
        info!(venue_id = %venue.id, "venue updated");
        Ok(venue)
    }

    pub async fn delete(&self, id: Uuid) -> Result<VenueRecord, AppError> {
        let venue = self
            .repo
            .delete_venue(id)
            .await
            .map_err(|err| not_found_or(err, id))?;
        self.cache.invalidate_venue_caches(venue.id, venue.owner_id).await;
        info!(venue_id = %venue.id, "venue deleted");
        Ok(venue)
    }
}

fn not_found_or(err: RepoError, id: Uuid) -> AppError {
    match err {
        RepoError::NotFound => AppError::not_found(ENTITY, id),
        other => AppError::Repo(other),
    }
}
