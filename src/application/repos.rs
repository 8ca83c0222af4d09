//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{EventDraft, EventRecord, VenueDraft, VenueRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueryFilter {
    pub category: Option<String>,
    pub city: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenueQueryFilter {
    pub city: Option<String>,
    pub sport: Option<String>,
}

#[async_trait]
pub trait EventsRepo: Send + Sync {
    async fn list_events(
        &self,
        filter: &EventQueryFilter,
        page: PageRequest,
    ) -> Result<Page<EventRecord>, RepoError>;

    /// Case-insensitive match on title, category and city.
    async fn search_events(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<Page<EventRecord>, RepoError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError>;

    async fn create_event(&self, draft: EventDraft) -> Result<EventRecord, RepoError>;

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<EventRecord, RepoError>;

    async fn delete_event(&self, id: Uuid) -> Result<EventRecord, RepoError>;
}

#[async_trait]
pub trait VenuesRepo: Send + Sync {
    async fn list_venues(
        &self,
        filter: &VenueQueryFilter,
        page: PageRequest,
    ) -> Result<Page<VenueRecord>, RepoError>;

    async fn search_venues(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<Page<VenueRecord>, RepoError>;

    async fn find_venue(&self, id: Uuid) -> Result<Option<VenueRecord>, RepoError>;

    async fn create_venue(&self, draft: VenueDraft) -> Result<VenueRecord, RepoError>;

    async fn update_venue(&self, id: Uuid, draft: VenueDraft) -> Result<VenueRecord, RepoError>;

    async fn delete_venue(&self, id: Uuid) -> Result<VenueRecord, RepoError>;
}
