//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a fresh random JobId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job status
///
/// Statuses only move forward: `queued → starting → downloading → processing → completed`,
/// with `error` reachable from any non-terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for a free worker
    Queued,
    /// Picked up by a worker, engine not yet transferring
    Starting,
    /// Engine is transferring bytes
    Downloading,
    /// Transfer finished, engine is muxing/converting
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with a classified error
    Error,
}

impl Status {
    /// Position along the forward path, used to reject regressions
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Status::Queued => 0,
            Status::Starting => 1,
            Status::Downloading => 2,
            Status::Processing => 3,
            Status::Completed | Status::Error => 4,
        }
    }

    /// Whether no further mutation may happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Starting => "starting",
            Status::Downloading => "downloading",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed taxonomy of job failure kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Content is blocked in the caller's region
    GeoBlocked,
    /// Content was removed or is otherwise unavailable
    ContentUnavailable,
    /// Content requires age confirmation
    AgeRestricted,
    /// Generic engine download failure
    DownloadFailed,
    /// Any non-download failure during execution
    ProcessFailed,
    /// Every playlist entry was skipped
    PartialSkip,
    /// Cancelled by a caller, a timeout, or shutdown
    Cancelled,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::GeoBlocked => "geo_blocked",
            ErrorKind::ContentUnavailable => "content_unavailable",
            ErrorKind::AgeRestricted => "age_restricted",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::ProcessFailed => "process_failed",
            ErrorKind::PartialSkip => "partial_skip",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// User-facing summary
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::GeoBlocked => "Video is blocked in your country",
            ErrorKind::ContentUnavailable => "Video is no longer available",
            ErrorKind::AgeRestricted => "Age-restricted video",
            ErrorKind::DownloadFailed => "Download failed",
            ErrorKind::ProcessFailed => "Process failed",
            ErrorKind::PartialSkip => "No entries could be retrieved",
            ErrorKind::Cancelled => "Download cancelled",
        }
    }
}

/// A classified job failure as exposed to pollers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobError {
    /// Failure category
    pub error_kind: ErrorKind,
    /// User-facing summary for the category
    pub message: String,
    /// Raw detail text (usually the engine's own message)
    pub detail: String,
}

impl JobError {
    /// Build an error of the given kind with its standard message
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            error_kind: kind,
            message: kind.message().to_string(),
            detail: detail.into(),
        }
    }
}

/// Output of the transcription stage for one item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transcription {
    /// Full transcript text
    pub text: String,
    /// Detected or requested language
    pub language: Option<String>,
    /// Number of timed segments
    pub segments: usize,
    /// Path of the plain-text transcript written next to the media file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_file: Option<String>,
}

/// One successfully produced media item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaItem {
    /// Title reported by the engine
    pub title: String,
    /// File name relative to the download directory
    pub filename: String,
    /// Target container (e.g., "mp4", "mp3")
    pub format: String,
    /// Requested quality
    pub quality: String,
    /// Duration in seconds, if known
    pub duration: Option<f64>,
    /// Remote thumbnail URL, if any
    pub thumbnail_url: Option<String>,
    /// Size on disk in bytes, if known
    pub size: Option<u64>,
    /// 1-based playlist position, if part of a playlist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Transcription, if requested and successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<Transcription>,
    /// Transcription failure text, if requested and failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_error: Option<String>,
}

/// A playlist entry that could not be retrieved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkipRecord {
    /// 1-based playlist position
    pub index: usize,
    /// Why the entry was skipped
    pub reason: String,
}

/// Item counts for a finished job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResultSummary {
    /// Entries the engine attempted
    pub total_attempted: usize,
    /// Entries that produced an item
    pub successful: usize,
    /// Entries that hard-failed
    pub failed: usize,
    /// Entries that were skipped
    pub skipped: usize,
}

/// Terminal result of a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    /// At least one item succeeded and none hard-failed
    Completed {
        /// Produced items
        downloads: Vec<MediaItem>,
        /// Skipped playlist entries
        skipped: Vec<SkipRecord>,
        /// Item counts
        summary: ResultSummary,
    },
    /// The job failed
    Failed {
        /// Classified error
        error: JobError,
        /// Skipped playlist entries observed before the failure
        skipped: Vec<SkipRecord>,
        /// Item counts
        summary: ResultSummary,
    },
}

impl JobResult {
    /// Failure result with no per-item information
    pub fn failure(error: JobError) -> Self {
        JobResult::Failed {
            error,
            skipped: Vec::new(),
            summary: ResultSummary::default(),
        }
    }

    /// The classified error, if this is a failure
    pub fn error(&self) -> Option<&JobError> {
        match self {
            JobResult::Failed { error, .. } => Some(error),
            JobResult::Completed { .. } => None,
        }
    }
}

/// Point-in-time, read-safe copy of a job's externally visible state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobSnapshot {
    /// Job identifier
    pub job_id: JobId,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f64,
    /// Requested URL
    pub url: String,
    /// Terminal result (None until completed or error)
    pub result: Option<JobResult>,
    /// Current speed in bytes per second
    pub speed: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<u64>,
    /// Bytes transferred so far for the current item
    pub downloaded_bytes: Option<u64>,
    /// Total bytes for the current item, if known
    pub total_bytes: Option<u64>,
    /// File the engine is currently writing
    pub current_file: Option<String>,
    /// Number of `finished` transfer events
    ///
    /// The engine reports one per downloaded stream, so an item merged from
    /// separate video and audio formats counts twice.
    pub items_finished: u32,
    /// Time spent waiting for a worker, in milliseconds
    pub queued_ms: u64,
    /// Non-fatal warnings
    pub warnings: Vec<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

/// Metadata about one video, returned by a probe
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VideoMetadata {
    /// Title
    pub title: String,
    /// Duration in seconds
    pub duration: f64,
    /// Highest resolution thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Uploader name
    pub uploader: String,
    /// View count
    pub view_count: u64,
    /// Upload date (YYYYMMDD)
    pub upload_date: Option<String>,
    /// Description truncated to 200 characters
    pub description: String,
    /// Canonical page URL
    pub webpage_url: String,
}

/// Result of a metadata probe (no download)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProbeResult {
    /// Whether the probe succeeded
    pub success: bool,
    /// Videos found (one for a single video, many for a playlist)
    pub videos: Vec<VideoMetadata>,
    /// Error messages
    pub errors: Vec<String>,
    /// Whether the URL is a playlist
    pub is_playlist: bool,
    /// Playlist title, if a playlist
    pub playlist_title: Option<String>,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job registered and waiting for a worker
    Queued {
        /// Job ID
        id: JobId,
        /// Requested URL
        url: String,
    },

    /// A worker picked the job up
    Starting {
        /// Job ID
        id: JobId,
    },

    /// Transfer progress
    Downloading {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        progress: f64,
        /// Current speed in bytes per second
        #[serde(skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },

    /// Transfer finished, post-processing started
    Processing {
        /// Job ID
        id: JobId,
    },

    /// Job completed
    Completed {
        /// Job ID
        id: JobId,
        /// Number of produced items
        items: usize,
    },

    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Classified error
        error: JobError,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

impl Event {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::Starting { .. } => "starting",
            Event::Downloading { .. } => "downloading",
            Event::Processing { .. } => "processing",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Shutdown => "shutdown",
        }
    }
}

/// Availability of one external tool
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolInfo {
    /// Implementation name
    pub name: String,
    /// Whether the tool can be used
    pub available: bool,
}

/// What the running instance can do
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Fetch engine in use
    pub engine: ToolInfo,
    /// Transcriber in use
    pub transcriber: ToolInfo,
    /// Whether ffmpeg was found (needed for time ranges)
    pub muxer_available: bool,
    /// Worker pool size
    pub max_concurrent_jobs: usize,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_rank_follows_forward_path() {
        let path = [
            Status::Queued,
            Status::Starting,
            Status::Downloading,
            Status::Processing,
            Status::Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].rank() < pair[1].rank(),
                "{:?} must rank below {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(Status::Error.rank(), Status::Completed.rank());
    }

    #[test]
    fn only_completed_and_error_are_terminal() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Error.is_terminal());
        assert!(!Status::Queued.is_terminal());
        assert!(!Status::Processing.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Status::Downloading).unwrap(),
            "downloading"
        );
        assert_eq!(Status::Error.to_string(), "error");
    }

    #[test]
    fn job_id_parses_its_own_display() {
        let id = JobId::new();
        assert_eq!(JobId::from_str(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn job_id_rejects_garbage() {
        assert!(JobId::from_str("not-a-uuid").is_err());
        assert!(JobId::from_str("").is_err());
    }

    #[test]
    fn job_error_carries_kind_message() {
        let err = JobError::new(ErrorKind::GeoBlocked, "raw text");
        assert_eq!(err.message, "Video is blocked in your country");
        assert_eq!(err.detail, "raw text");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error_kind"], "geo_blocked");
    }

    #[test]
    fn job_result_is_tagged_by_outcome() {
        let result = JobResult::failure(JobError::new(ErrorKind::Cancelled, "stop"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"]["error_kind"], "cancelled");
        assert_eq!(result.error().unwrap().error_kind, ErrorKind::Cancelled);
    }

    #[test]
    fn error_kind_codes_match_serde_names() {
        let kinds = [
            ErrorKind::GeoBlocked,
            ErrorKind::ContentUnavailable,
            ErrorKind::AgeRestricted,
            ErrorKind::DownloadFailed,
            ErrorKind::ProcessFailed,
            ErrorKind::PartialSkip,
            ErrorKind::Cancelled,
        ];
        for kind in kinds {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.code());
        }
    }
}
