use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metrics::{histogram, increment_counter};
use tracing::info;

use crate::error::ApiError;
use crate::upload::UploadBody;
use crate::AppState;

pub async fn upload(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
    payload: Result<Json<UploadBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::BadRequest(err.to_string()))?;
    info!("received upload for item {:?}", body.item_id);

    let start = Instant::now();
    state.pipeline.process(&api_key, body).await?;
    let elapsed = start.elapsed();

    increment_counter!("markethub_upload");
    histogram!("markethub_upload_time", elapsed);

    Ok(StatusCode::OK)
}
