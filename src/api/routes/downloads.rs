//! Job handlers: submit, poll, cancel.

use super::{CancelResponse, DownloadAccepted, parse_job_id};
use crate::api::AppState;
use crate::compiler::DownloadRequest;
use crate::error::{Error, Result};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

/// POST /download - Submit a download request
#[utoipa::path(
    post,
    path = "/api/download",
    tag = "downloads",
    request_body = crate::compiler::DownloadRequest,
    responses(
        (status = 202, description = "Job accepted and queued", body = DownloadAccepted),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    body: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DownloadAccepted>)> {
    let Json(request) = body?;
    let job_id = state.downloader.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(DownloadAccepted { job_id })))
}

/// GET /download/status/:job_id - Poll a job
#[utoipa::path(
    get,
    path = "/api/download/status/{job_id}",
    tag = "downloads",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Current job snapshot", body = crate::types::JobSnapshot),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn get_download_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<crate::types::JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    state
        .downloader
        .status(id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("job {id}")))
}

/// POST /download/:job_id/cancel - Cancel a queued or running job
#[utoipa::path(
    post,
    path = "/api/download/{job_id}/cancel",
    tag = "downloads",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Cancellation result", body = CancelResponse),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>> {
    let id = parse_job_id(&job_id)?;
    let cancelled = state.downloader.cancel(id).await?;
    Ok(Json(CancelResponse { cancelled }))
}
