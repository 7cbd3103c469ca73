use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use metrics::{histogram, increment_counter};
use serde::Deserialize;

use crate::aggregate::{CurrentlyShownView, HistoryView};
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_HISTORY_ENTRIES: i64 = 300;
const MAX_HISTORY_ENTRIES: i64 = 1800;

pub async fn current_listings(
    State(state): State<AppState>,
    Path((item_id, world_or_dc)): Path<(i32, String)>,
) -> Result<Json<CurrentlyShownView>, ApiError> {
    increment_counter!("markethub_listings_request");

    if world_or_dc.trim().is_empty() || !state.resolver.is_marketable(item_id) {
        return Err(ApiError::NotFound);
    }

    let start = Instant::now();
    let view = state.aggregator.listings_view(item_id, &world_or_dc).await?;
    histogram!("markethub_query", start.elapsed(), "type" => "listings");

    Ok(Json(view))
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HistoryQuery {
    pub entries: Option<i64>,
}

pub async fn sale_history(
    State(state): State<AppState>,
    Path((item_id, world_or_dc)): Path<(i32, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryView>, ApiError> {
    increment_counter!("markethub_history_request");

    if world_or_dc.trim().is_empty() || !state.resolver.is_marketable(item_id) {
        return Err(ApiError::NotFound);
    }

    let limit = query
        .entries
        .unwrap_or(DEFAULT_HISTORY_ENTRIES)
        .clamp(1, MAX_HISTORY_ENTRIES);

    let start = Instant::now();
    let view = state
        .aggregator
        .sales_view(item_id, &world_or_dc, limit)
        .await?;
    histogram!("markethub_query", start.elapsed(), "type" => "history");

    Ok(Json(view))
}
