//! Traits for transcription post-processing

use async_trait::async_trait;
use std::path::Path;

use crate::types::Transcription;

/// Trait for speech-to-text transcription of produced media files
///
/// The runner only calls [`Transcriber::transcribe`] when transcription was
/// requested and [`Transcriber::is_available`] returns `true`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file
    ///
    /// # Arguments
    ///
    /// * `media_file` - Path to the audio/video file
    /// * `language` - Language hint (`"auto"` lets the model detect it)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, the external tool fails to run,
    /// or its output cannot be read.
    async fn transcribe(&self, media_file: &Path, language: &str) -> crate::Result<Transcription>;

    /// Whether this transcriber can run at all
    fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
