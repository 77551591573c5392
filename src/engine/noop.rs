//! No-op engine for graceful degradation

use super::traits::{EngineCapabilities, EngineError, EngineOutcome, FetchEngine};
use crate::compiler::RequestConfig;
use crate::progress::ProgressSender;
use crate::types::ProbeResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

const UNAVAILABLE: &str =
    "yt-dlp binary not found. Configure ytdlp_path in config or ensure yt-dlp is in PATH.";

/// Engine used when no yt-dlp binary is available
///
/// Jobs still get created and fail with `process_failed`, so callers see a
/// classified error instead of a rejected request.
pub struct NoOpEngine;

#[async_trait]
impl FetchEngine for NoOpEngine {
    async fn extract_and_download(
        &self,
        _url: &str,
        _config: &RequestConfig,
        _progress: ProgressSender,
        _cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        Err(EngineError::Process(UNAVAILABLE.into()))
    }

    async fn probe(&self, _url: &str) -> Result<ProbeResult, EngineError> {
        Err(EngineError::Process(UNAVAILABLE.into()))
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_download: false,
            can_probe: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
