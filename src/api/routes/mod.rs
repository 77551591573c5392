//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Job submission, status and cancellation
//! - [`metadata`] - Probe-only metadata lookup
//! - [`files`] - Produced files and thumbnails
//! - [`system`] - Health, capabilities, events, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::JobId;

mod downloads;
mod files;
mod metadata;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use downloads::*;
pub use files::*;
pub use metadata::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Response for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadAccepted {
    /// Identifier to poll with GET /download/status/{job_id}
    pub job_id: JobId,
}

/// Request body for POST /metadata
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MetadataRequest {
    /// Media or playlist URL
    #[serde(default)]
    pub url: String,
}

/// Response for POST /download/{job_id}/cancel
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    /// Whether a cancellation was signalled (false if the job had already finished)
    pub cancelled: bool,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Parse a job id path segment; malformed ids are unknown ids
pub(crate) fn parse_job_id(raw: &str) -> crate::Result<JobId> {
    raw.parse()
        .map_err(|_| crate::Error::NotFound(format!("job {raw}")))
}
