//! Traits and types for fetch engines

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::compiler::RequestConfig;
use crate::progress::ProgressSender;
use crate::types::{MediaItem, ProbeResult};

/// Outcome of one playlist entry (or the single entry of a non-playlist URL)
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// The entry produced a media item
    Downloaded(MediaItem),
    /// The entry could not be retrieved and was skipped
    Skipped {
        /// 1-based position
        index: usize,
        /// Why it was skipped
        reason: String,
    },
    /// The entry hard-failed
    Failed {
        /// 1-based position
        index: usize,
        /// Raw engine failure text
        message: String,
    },
}

/// Per-entry results of one engine call
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutcome {
    /// Entry outcomes in the order the engine reported them
    pub entries: Vec<EntryOutcome>,
}

impl EngineOutcome {
    /// Outcome with a single downloaded item
    pub fn single(item: MediaItem) -> Self {
        Self {
            entries: vec![EntryOutcome::Downloaded(item)],
        }
    }
}

/// Failure of a whole engine call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Typed download failure; the message is classified
    #[error("{0}")]
    Download(String),
    /// Any other failure (spawn errors, I/O, malformed output)
    #[error("{0}")]
    Process(String),
    /// The call was cancelled through its token
    #[error("cancelled")]
    Cancelled,
}

/// Capabilities of a fetch engine implementation
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Can download media
    pub can_download: bool,
    /// Can probe metadata without downloading
    pub can_probe: bool,
}

/// Trait for media extraction and download engines
///
/// An engine performs extraction, format negotiation, transfer and muxing inside
/// a single call. While the call runs it reports progress by sending JSON
/// payloads on the provided channel; it never touches the job store.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Extract and download everything the URL refers to
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] once `cancel` fires, a
    /// [`EngineError::Download`] for a failure the classifier should inspect,
    /// and [`EngineError::Process`] for anything else.
    async fn extract_and_download(
        &self,
        url: &str,
        config: &RequestConfig,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError>;

    /// Fetch metadata without downloading
    async fn probe(&self, url: &str) -> Result<ProbeResult, EngineError>;

    /// Query capabilities of this engine
    fn capabilities(&self) -> EngineCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
