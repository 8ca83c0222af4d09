//! Event reads and writes. Every successful write purges the affected cached
//! views before returning.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{EventQueryFilter, EventsRepo, RepoError};
use crate::cache::EventCache;
use crate::domain::entities::{EventDraft, EventRecord};

const ENTITY: &str = "event";

#[derive(Clone)]
pub struct EventService {
    repo: Arc<dyn EventsRepo>,
    cache: EventCache,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventsRepo>, cache: EventCache) -> Self {
        Self { repo, cache }
    }

    pub async fn list(
        &self,
        filter: &EventQueryFilter,
        page: PageRequest,
    ) -> Result<Page<EventRecord>, AppError> {
        Ok(self.repo.list_events(filter, page).await?)
    }

    pub async fn search(&self, term: &str, page: PageRequest) -> Result<Page<EventRecord>, AppError> {
        Ok(self.repo.search_events(term.trim(), page).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<EventRecord, AppError> {
        self.repo
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))
    }

    pub async fn create(&self, draft: EventDraft) -> Result<EventRecord, AppError> {
        let draft = draft.normalized()?;
        let event = self.repo.create_event(draft).await?;
        self.cache
            .invalidate_event_caches(event.id, event.organizer_id)
            .await;
        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    /// Reassigning the organizer also purges the previous organizer's view.
    pub async fn update(&self, id: Uuid, draft: EventDraft) -> Result<EventRecord, AppError> {
        let draft = draft.normalized()?;
        let previous = self.get(id).await?;
        let event = self
            .repo
            .update_event(id, draft)
            .await
            .map_err(|err| not_found_or(err, id))?;

        self.cache
            .invalidate_event_caches(event.id, event.organizer_id)
            .await;
        if previous.organizer_id != event.organizer_id {
            self.cache.invalidate_user_events(previous.organizer_id).await;
        }
        info!(event_id = %event.id, "event updated");
        Ok(event)
    }

    pub async fn delete(&self, id: Uuid) -> Result<EventRecord, AppError> {
        let event = self
            .repo
            .delete_event(id)
            .await
            .map_err(|err| not_found_or(err, id))?;
        self.cache
            .invalidate_event_caches(event.id, event.organizer_id)
            .await;
        info!(event_id = %event.id, "event deleted");
        Ok(event)
    }
}

fn not_found_or(err: RepoError, id: Uuid) -> AppError {
    match err {
        RepoError::NotFound => AppError::not_found(ENTITY, id),
        other => AppError::Repo(other),
    }
}
