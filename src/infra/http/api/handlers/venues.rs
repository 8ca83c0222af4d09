//! Venue handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use sportsbuddy_api_types::{PageView, VenueView, VenueWrite};
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiOk};
use crate::infra::http::api::models::{
    SearchQuery, VenueListQuery, page_view, venue_draft, venue_to_view,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_venues(
    State(state): State<ApiState>,
    Query(query): Query<VenueListQuery>,
) -> Result<ApiOk<PageView<VenueView>>, ApiError> {
    let request = query.page_request();
    let page = state.venues.list(&query.filter(), request).await?;
    Ok(ApiOk::new(page_view(page, request, venue_to_view)))
}

pub async fn search_venues(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<ApiOk<PageView<VenueView>>, ApiError> {
    let term = query.term().ok_or_else(|| {
        ApiError::bad_request(
            "Search term is required",
            Some("pass a non-empty `q` parameter".to_string()),
        )
    })?;
    let request = query.page_request();
    let page = state.venues.search(term, request).await?;
    Ok(ApiOk::new(page_view(page, request, venue_to_view)))
}

pub async fn get_venue(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<VenueView>, ApiError> {
    Ok(ApiOk::new(venue_to_view(state.venues.get(id).await?)))
}

pub async fn create_venue(
    State(state): State<ApiState>,
    Json(payload): Json<VenueWrite>,
) -> Result<ApiOk<VenueView>, ApiError> {
    let venue = state.venues.create(venue_draft(payload)).await?;
    Ok(ApiOk::created(venue_to_view(venue)))
}

pub async fn update_venue(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VenueWrite>,
) -> Result<ApiOk<VenueView>, ApiError> {
    let venue = state.venues.update(id, venue_draft(payload)).await?;
    Ok(ApiOk::new(venue_to_view(venue)))
}

pub async fn delete_venue(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<VenueView>, ApiError> {
    Ok(ApiOk::new(venue_to_view(state.venues.delete(id).await?)))
}
