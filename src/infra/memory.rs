//! Process-local repositories backing the demonstration endpoints.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    EventQueryFilter, EventsRepo, RepoError, VenueQueryFilter, VenuesRepo,
};
use crate::domain::entities::{EventDraft, EventRecord, VenueDraft, VenueRecord};

#[derive(Debug, Default)]
pub struct InMemoryEvents {
    records: DashMap<Uuid, EventRecord>,
}

impl InMemoryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot ordered by start time, then id.
    fn sorted(&self, keep: impl Fn(&EventRecord) -> bool) -> Vec<EventRecord> {
        let mut events: Vec<EventRecord> = self
            .records
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        events
    }
}

#[async_trait]
impl EventsRepo for InMemoryEvents {
    async fn list_events(
        &self,
        filter: &EventQueryFilter,
        page: PageRequest,
    ) -> Result<Page<EventRecord>, RepoError> {
        let events = self.sorted(|event| {
            matches_text(filter.category.as_deref(), &event.category)
                && matches_text(filter.city.as_deref(), &event.city)
                && filter.featured.is_none_or(|featured| event.featured == featured)
        });
        Ok(Page::slice(events, page))
    }

    async fn search_events(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<Page<EventRecord>, RepoError> {
        let needle = term.to_lowercase();
        let events = self.sorted(|event| {
            [&event.title, &event.category, &event.city]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        });
        Ok(Page::slice(events, page))
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_event(&self, draft: EventDraft) -> Result<EventRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = EventRecord {
            id: Uuid::new_v4(),
            title: draft.title,
            category: draft.category,
            city: draft.city,
            organizer_id: draft.organizer_id,
            starts_at: draft.starts_at,
            venue_id: draft.venue_id,
            featured: draft.featured,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<EventRecord, RepoError> {
        let mut entry = self.records.get_mut(&id).ok_or(RepoError::NotFound)?;
        let record = entry.value_mut();
        record.title = draft.title;
        record.category = draft.category;
        record.city = draft.city;
        record.organizer_id = draft.organizer_id;
        record.starts_at = draft.starts_at;
        record.venue_id = draft.venue_id;
        record.featured = draft.featured;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<EventRecord, RepoError> {
        self.records
            .remove(&id)
            .map(|(_, record)| record)
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryVenues {
    records: DashMap<Uuid, VenueRecord>,
}

impl InMemoryVenues {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self, keep: impl Fn(&VenueRecord) -> bool) -> Vec<VenueRecord> {
        let mut venues: Vec<VenueRecord> = self
            .records
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        venues.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        venues
    }
}

#[async_trait]
impl VenuesRepo for InMemoryVenues {
    async fn list_venues(
        &self,
        filter: &VenueQueryFilter,
        page: PageRequest,
    ) -> Result<Page<VenueRecord>, RepoError> {
        let venues = self.sorted(|venue| {
            matches_text(filter.city.as_deref(), &venue.city)
                && filter.sport.as_deref().is_none_or(|sport| {
                    venue
                        .sports
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(sport))
                })
        });
        Ok(Page::slice(venues, page))
    }

    async fn search_venues(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<Page<VenueRecord>, RepoError> {
        let needle = term.to_lowercase();
        let venues = self.sorted(|venue| {
            venue.name.to_lowercase().contains(&needle)
                || venue.city.to_lowercase().contains(&needle)
                || venue
                    .sports
                    .iter()
                    .any(|sport| sport.to_lowercase().contains(&needle))
        });
        Ok(Page::slice(venues, page))
    }

    async fn find_venue(&self, id: Uuid) -> Result<Option<VenueRecord>, RepoError> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_venue(&self, draft: VenueDraft) -> Result<VenueRecord, RepoError> {
        let duplicate = self.records.iter().any(|entry| {
            let existing = entry.value();
            existing.name.eq_ignore_ascii_case(&draft.name)
                && existing.city.eq_ignore_ascii_case(&draft.city)
        });
        if duplicate {
            return Err(RepoError::Duplicate {
                constraint: "venues_name_city_key".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = VenueRecord {
            id: Uuid::new_v4(),
            name: draft.name,
            city: draft.city,
            sports: draft.sports,
            owner_id: draft.owner_id,
            latitude: draft.latitude,
            longitude: draft.longitude,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_venue(&self, id: Uuid, draft: VenueDraft) -> Result<VenueRecord, RepoError> {
        let mut entry = self.records.get_mut(&id).ok_or(RepoError::NotFound)?;
        let record = entry.value_mut();
        record.name = draft.name;
        record.city = draft.city;
        record.sports = draft.sports;
        record.owner_id = draft.owner_id;
        record.latitude = draft.latitude;
        record.longitude = draft.longitude;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_venue(&self, id: Uuid) -> Result<VenueRecord, RepoError> {
        self.records
            .remove(&id)
            .map(|(_, record)| record)
            .ok_or(RepoError::NotFound)
    }
}

fn matches_text(expected: Option<&str>, actual: &str) -> bool {
    expected.is_none_or(|expected| expected.eq_ignore_ascii_case(actual))
}
