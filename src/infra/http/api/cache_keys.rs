//! Request-to-key mapping for the cached routes.
//!
//! Each function reuses the resource module's key builder, so a response
//! cached here is exactly the entry that module's invalidation removes.

use axum::extract::Query;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::cache::{CacheKey, EventCache, VenueCache};

use super::models::{EventListQuery, SearchQuery, VenueListQuery};

pub fn event_list(events: EventCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| {
        let Query(query) = Query::<EventListQuery>::try_from_uri(&parts.uri).ok()?;
        Some(events.list_key(query.page_request().page, &query.cache_filters()))
    }
}

pub fn event_search(events: EventCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| {
        let Query(query) = Query::<SearchQuery>::try_from_uri(&parts.uri).ok()?;
        Some(events.search_key(query.term()?, query.page_request().page))
    }
}

pub fn event_detail(events: EventCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| Some(events.detail_key(path_id(parts)?))
}

pub fn venue_list(venues: VenueCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| {
        let Query(query) = Query::<VenueListQuery>::try_from_uri(&parts.uri).ok()?;
        Some(venues.list_key(query.page_request().page, &query.cache_filters()))
    }
}

pub fn venue_search(venues: VenueCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| {
        let Query(query) = Query::<SearchQuery>::try_from_uri(&parts.uri).ok()?;
        Some(venues.search_key(query.term()?, query.page_request().page))
    }
}

pub fn venue_detail(venues: VenueCache) -> impl Fn(&Parts) -> Option<CacheKey> + Clone {
    move |parts| Some(venues.detail_key(path_id(parts)?))
}

/// Trailing path segment as a UUID; anything else is left uncached.
fn path_id(parts: &Parts) -> Option<Uuid> {
    let segment = parts.uri.path().trim_end_matches('/').rsplit('/').next()?;
    Uuid::parse_str(segment).ok()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::cache::CacheContext;

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .uri(uri)
            .body(())
            .expect("request")
            .into_parts()
            .0
    }

    #[test]
    fn list_key_ignores_parameter_order() {
        let context = CacheContext::in_memory();
        let key_fn = event_list(context.events().clone());
        let a = key_fn(&parts("/api/events?page=2&category=Football&city=Lisbon")).expect("key");
        let b = key_fn(&parts("/api/events?city=Lisbon&category=Football&page=2")).expect("key");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "events:list:page:2:category:Football:city:Lisbon");
    }

    #[test]
    fn detail_key_requires_a_uuid() {
        let context = CacheContext::in_memory();
        let key_fn = venue_detail(context.venues().clone());
        let id = Uuid::nil();
        assert_eq!(
            key_fn(&parts(&format!("/api/venues/{id}"))),
            Some(context.venues().detail_key(id))
        );
        assert_eq!(key_fn(&parts("/api/venues/not-a-uuid")), None);
    }

    #[test]
    fn blank_search_is_not_cached() {
        let context = CacheContext::in_memory();
        let key_fn = event_search(context.events().clone());
        assert!(key_fn(&parts("/api/events/search?q=")).is_none());
        assert!(key_fn(&parts("/api/events/search?q=derby")).is_some());
    }
}
