//! No-op transcriber for graceful degradation

use super::traits::Transcriber;
use crate::types::Transcription;
use async_trait::async_trait;
use std::path::Path;

/// Transcriber used when no whisper binary is available
///
/// Reports itself unavailable, so jobs that ask for transcription complete
/// with a warning instead of failing.
pub struct NoOpTranscriber;

#[async_trait]
impl Transcriber for NoOpTranscriber {
    async fn transcribe(&self, _media_file: &Path, _language: &str) -> crate::Result<Transcription> {
        Err(crate::Error::NotSupported(
            "Transcription requires an external whisper binary. \
             Configure whisper_path in config or ensure whisper is in PATH."
                .into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_is_unavailable_and_refuses() {
        let transcriber = NoOpTranscriber;

        assert!(!transcriber.is_available());
        let err = transcriber
            .transcribe(Path::new("clip.mp3"), "en")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotSupported(_)));
    }
}
