//! Query strings and wire conversions for the API handlers.

use serde::Deserialize;
use sportsbuddy_api_types::{EventView, EventWrite, PageView, VenueView, VenueWrite};

use crate::application::pagination::{DEFAULT_PER_PAGE, Page, PageRequest};
use crate::application::repos::{EventQueryFilter, VenueQueryFilter};
use crate::cache::Filters;
use crate::domain::entities::{EventDraft, EventRecord, VenueDraft, VenueRecord};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub featured: Option<bool>,
}

impl EventListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }

    pub fn filter(&self) -> EventQueryFilter {
        EventQueryFilter {
            category: non_blank(self.category.as_deref()),
            city: non_blank(self.city.as_deref()),
            featured: self.featured,
        }
    }

    /// Everything besides the page number that changes the response.
    pub fn cache_filters(&self) -> Filters {
        let filter = self.filter();
        let mut filters = Filters::new()
            .with("category", filter.category.unwrap_or_default())
            .with("city", filter.city.unwrap_or_default());
        if let Some(featured) = filter.featured {
            filters.insert("featured", featured.to_string());
        }
        with_page_size(filters, self.page_request())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub city: Option<String>,
    pub sport: Option<String>,
}

impl VenueListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }

    pub fn filter(&self) -> VenueQueryFilter {
        VenueQueryFilter {
            city: non_blank(self.city.as_deref()),
            sport: non_blank(self.sport.as_deref()),
        }
    }

    pub fn cache_filters(&self) -> Filters {
        let filter = self.filter();
        let filters = Filters::new()
            .with("city", filter.city.unwrap_or_default())
            .with("sport", filter.sport.unwrap_or_default());
        with_page_size(filters, self.page_request())
    }
}

/// Search uses the default page size; only `q` and `page` vary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

impl SearchQuery {
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|term| !term.is_empty())
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, None)
    }
}

fn with_page_size(mut filters: Filters, request: PageRequest) -> Filters {
    if request.per_page != DEFAULT_PER_PAGE {
        filters.insert("perPage", request.per_page.to_string());
    }
    filters
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn event_to_view(event: EventRecord) -> EventView {
    EventView {
        id: event.id,
        title: event.title,
        category: event.category,
        city: event.city,
        organizer_id: event.organizer_id,
        starts_at: event.starts_at,
        venue_id: event.venue_id,
        featured: event.featured,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

pub fn event_draft(write: EventWrite) -> EventDraft {
    EventDraft {
        title: write.title,
        category: write.category,
        city: write.city,
        organizer_id: write.organizer_id,
        starts_at: write.starts_at,
        venue_id: write.venue_id,
        featured: write.featured,
    }
}

pub fn venue_to_view(venue: VenueRecord) -> VenueView {
    VenueView {
        id: venue.id,
        name: venue.name,
        city: venue.city,
        sports: venue.sports,
        owner_id: venue.owner_id,
        latitude: venue.latitude,
        longitude: venue.longitude,
        created_at: venue.created_at,
        updated_at: venue.updated_at,
    }
}

pub fn venue_draft(write: VenueWrite) -> VenueDraft {
    VenueDraft {
        name: write.name,
        city: write.city,
        sports: write.sports,
        owner_id: write.owner_id,
        latitude: write.latitude,
        longitude: write.longitude,
    }
}

pub fn page_view<T, U>(page: Page<T>, request: PageRequest, f: impl FnMut(T) -> U) -> PageView<U> {
    let page = page.map(f);
    PageView {
        items: page.items,
        page: request.page,
        per_page: request.per_page,
        total: page.total,
    }
}
