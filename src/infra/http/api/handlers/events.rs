//! Event handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use sportsbuddy_api_types::{EventView, EventWrite, PageView};
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiOk};
use crate::infra::http::api::models::{
    EventListQuery, SearchQuery, event_draft, event_to_view, page_view,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_events(
    State(state): State<ApiState>,
    Query(query): Query<EventListQuery>,
) -> Result<ApiOk<PageView<EventView>>, ApiError> {
    let request = query.page_request();
    let page = state.events.list(&query.filter(), request).await?;
    Ok(ApiOk::new(page_view(page, request, event_to_view)))
}

pub async fn search_events(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<ApiOk<PageView<EventView>>, ApiError> {
    let Some(term) = query.term() else {
        return Err(ApiError::bad_request(
            "Search term is required",
            Some("pass a non-empty `q` parameter".to_string()),
        ));
    };
    let request = query.page_request();
    let page = state.events.search(term, request).await?;
    Ok(ApiOk::new(page_view(page, request, event_to_view)))
}

pub async fn get_event(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<EventView>, ApiError> {
    let event = state.events.get(id).await?;
    Ok(ApiOk::new(event_to_view(event)))
}

pub async fn create_event(
    State(state): State<ApiState>,
    Json(payload): Json<EventWrite>,
) -> Result<ApiOk<EventView>, ApiError> {
    let event = state.events.create(event_draft(payload)).await?;
    Ok(ApiOk::created(event_to_view(event)))
}

pub async fn update_event(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventWrite>,
) -> Result<ApiOk<EventView>, ApiError> {
    let event = state.events.update(id, event_draft(payload)).await?;
    Ok(ApiOk::new(event_to_view(event)))
}

pub async fn delete_event(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<EventView>, ApiError> {
    let event = state.events.delete(id).await?;
    Ok(ApiOk::new(event_to_view(event)))
}
