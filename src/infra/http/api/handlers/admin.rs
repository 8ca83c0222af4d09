//! Admin handlers

use axum::extract::{Path, State};
use sportsbuddy_api_types::{EventView, FlushView};
use tracing::info;

use crate::application::pagination::{MAX_PER_PAGE, PageRequest};
use crate::application::repos::EventQueryFilter;
use crate::cache::{KeyPattern, ResourceFamily};
use crate::infra::http::api::error::{ApiError, ApiOk};
use crate::infra::http::api::models::event_to_view;
use crate::infra::http::api::state::ApiState;

/// Every event, page by page. Served with no-store headers and never cached.
pub async fn export_events(
    State(state): State<ApiState>,
) -> Result<ApiOk<Vec<EventView>>, ApiError> {
    let filter = EventQueryFilter::default();
    let mut exported = Vec::new();
    let mut page = 1;
    loop {
        let request = PageRequest::new(Some(page), Some(MAX_PER_PAGE));
        let batch = state.events.list(&filter, request).await?;
        let done = batch.items.len() < MAX_PER_PAGE as usize;
        exported.extend(batch.items.into_iter().map(event_to_view));
        if done {
            break;
        }
        page += 1;
    }
    Ok(ApiOk::new(exported))
}

/// Drop every cached view of one family.
pub async fn flush_family(
    State(state): State<ApiState>,
    Path(family): Path<String>,
) -> Result<ApiOk<FlushView>, ApiError> {
    let family = ResourceFamily::parse(&family).ok_or_else(|| {
        ApiError::bad_request(
            "Unknown cache family",
            Some(format!(
                "expected one of: {}",
                ResourceFamily::ALL.map(ResourceFamily::as_str).join(", ")
            )),
        )
    })?;

    let cache = &state.cache;
    let removed = match family {
        ResourceFamily::Events => cache.events().invalidate_all_event_caches().await,
        ResourceFamily::Venues => cache.venues().invalidate_all_venue_caches().await,
        ResourceFamily::Athletes => cache.athletes().invalidate_all_athlete_caches().await,
        ResourceFamily::Community => cache.community().invalidate_all_community_caches().await,
        ResourceFamily::Leaderboard => {
            cache
                .leaderboard()
                .invalidate_all_leaderboard_caches()
                .await
        }
        ResourceFamily::Admin => {
            cache
                .store()
                .delete_by_pattern(KeyPattern::family(ResourceFamily::Admin))
                .await
        }
    };
    info!(
        target = "sportsbuddy::http::admin",
        family = family.as_str(),
        removed,
        "cache family flushed"
    );

    Ok(ApiOk::new(FlushView {
        family: family.as_str().to_string(),
        removed,
    }))
}
