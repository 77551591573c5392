//! Artifact handlers: produced files and thumbnails from the download directory.

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::utils::{display_file_name, resolve_artifact_path};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// GET /download/file/*path - Produced file, served as an attachment
#[utoipa::path(
    get,
    path = "/api/download/file/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "Path relative to the download directory")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Path outside the download directory", body = crate::error::ApiError),
        (status = 404, description = "File not found", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    let file = resolve_artifact_path(state.config.download_dir(), &path).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        display_file_name(&file).replace('"', "")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    stream_file(&file, HeaderValue::from_static("application/octet-stream"), disposition).await
}

/// GET /download/thumbnail/*path - Produced thumbnail
#[utoipa::path(
    get,
    path = "/api/download/thumbnail/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "Path relative to the download directory")
    ),
    responses(
        (status = 200, description = "Thumbnail image", content_type = "image/jpeg"),
        (status = 400, description = "Path outside the download directory", body = crate::error::ApiError),
        (status = 404, description = "Thumbnail not found", body = crate::error::ApiError)
    )
)]
pub async fn download_thumbnail(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    let file = resolve_artifact_path(state.config.download_dir(), &path).await?;

    stream_file(
        &file,
        HeaderValue::from_static("image/jpeg"),
        HeaderValue::from_static("inline"),
    )
    .await
}

async fn stream_file(
    file: &std::path::Path,
    content_type: HeaderValue,
    disposition: HeaderValue,
) -> Result<Response> {
    let handle = tokio::fs::File::open(file).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("file {}", display_file_name(file)))
        } else {
            Error::Io(e)
        }
    })?;
    let length = handle.metadata().await?.len();

    tracing::debug!(file = %file.display(), length, "serving artifact");

    let body = Body::from_stream(ReaderStream::new(handle));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response())
}
