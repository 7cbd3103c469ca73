use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::entities::UploadCountHistory;
use crate::error::ApiError;
use crate::AppState;

/// The rolling 30-day upload counters, verbatim. An instance that has never
/// seen an upload reports an empty window.
pub async fn upload_history(
    State(state): State<AppState>,
) -> Result<Json<UploadCountHistory>, ApiError> {
    let history = state
        .upload_counts
        .retrieve()
        .await?
        .unwrap_or_else(|| UploadCountHistory {
            last_push: Utc::now(),
            counts: Vec::new(),
        });
    Ok(Json(history))
}

#[derive(Debug, Serialize)]
pub struct SourceUploadCountView {
    pub name: String,
    pub upload_count: i64,
}

/// Cumulative upload counts per trusted source. Key hashes stay private.
pub async fn uploader_upload_counts(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceUploadCountView>>, ApiError> {
    let sources = state.trusted.list().await?;
    Ok(Json(
        sources
            .into_iter()
            .map(|source| SourceUploadCountView {
                name: source.name,
                upload_count: source.upload_count,
            })
            .collect(),
    ))
}
