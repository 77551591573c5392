//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "REST API for submitting media download jobs, polling their state and retrieving produced files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000/api", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_download,
        crate::api::routes::get_download_status,
        crate::api::routes::cancel_download,

        // Metadata
        crate::api::routes::probe_metadata,

        // Files
        crate::api::routes::download_file,
        crate::api::routes::download_thumbnail,

        // System
        crate::api::routes::health_check,
        crate::api::routes::get_capabilities,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Request types from compiler
        crate::compiler::DownloadRequest,
        crate::compiler::AdvancedOptions,
        crate::compiler::SubtitleOptions,
        crate::compiler::TimeRangeOptions,
        crate::compiler::NetworkSettings,

        // Core types from types.rs
        crate::types::JobId,
        crate::types::Status,
        crate::types::ErrorKind,
        crate::types::JobError,
        crate::types::JobResult,
        crate::types::JobSnapshot,
        crate::types::MediaItem,
        crate::types::SkipRecord,
        crate::types::ResultSummary,
        crate::types::Transcription,
        crate::types::ProbeResult,
        crate::types::VideoMetadata,
        crate::types::Capabilities,
        crate::types::ToolInfo,
        crate::types::Event,

        // Config types from config.rs
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::ToolsConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::DownloadAccepted,
        crate::api::routes::MetadataRequest,
        crate::api::routes::CancelResponse,
        crate::api::routes::HealthResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Download jobs - Submit, poll and cancel"),
        (name = "metadata", description = "Metadata probe without creating a job"),
        (name = "files", description = "Produced files and thumbnails"),
        (name = "system", description = "System endpoints - Health checks, capabilities, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();

        for path in [
            "/api/download",
            "/api/download/status/{job_id}",
            "/api/download/{job_id}/cancel",
            "/api/metadata",
            "/api/download/file/{path}",
            "/api/download/thumbnail/{path}",
            "/api/health",
            "/api/capabilities",
            "/api/openapi.json",
            "/api/events",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "OpenAPI spec is missing {path}"
            );
        }
    }

    #[test]
    fn spec_has_request_and_error_schemas() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components should be present");

        for schema in ["DownloadRequest", "JobSnapshot", "ErrorKind", "ApiError"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn spec_serializes_with_title() {
        let json = ApiDoc::openapi().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["info"]["title"], "media-dl REST API");
        assert!(value["openapi"].as_str().unwrap().starts_with("3."));
    }
}
