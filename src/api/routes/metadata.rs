//! Metadata probe handler.

use super::MetadataRequest;
use crate::api::AppState;
use crate::error::Result;
use crate::types::ProbeResult;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

/// POST /metadata - Probe a URL without creating a job
///
/// Engine failures are reported with `success = false`, not as HTTP errors.
#[utoipa::path(
    post,
    path = "/api/metadata",
    tag = "metadata",
    request_body = MetadataRequest,
    responses(
        (status = 200, description = "Probe result (check `success`)", body = ProbeResult),
        (status = 400, description = "Missing URL", body = crate::error::ApiError)
    )
)]
pub async fn probe_metadata(
    State(state): State<AppState>,
    body: std::result::Result<Json<MetadataRequest>, JsonRejection>,
) -> Result<Json<ProbeResult>> {
    let Json(request) = body?;
    let result = state.downloader.probe(&request.url).await?;
    Ok(Json(result))
}
