//! CLI-based transcriber using the external whisper binary

use super::traits::Transcriber;
use crate::types::Transcription;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Transcriber that runs the `whisper` CLI and reads its JSON output
///
/// Writes `<stem>.transcript.txt` (plain text) and `<stem>.transcript.json`
/// (full result with timestamps) next to the media file.
pub struct WhisperCliTranscriber {
    binary_path: PathBuf,
    model: String,
}

impl WhisperCliTranscriber {
    /// Create a transcriber with an explicit binary path and model name
    pub fn new(binary_path: PathBuf, model: impl Into<String>) -> Self {
        Self {
            binary_path,
            model: model.into(),
        }
    }

    /// Attempt to find whisper in PATH
    pub fn from_path(model: impl Into<String>) -> Option<Self> {
        let model = model.into();
        which::which("whisper")
            .ok()
            .map(|path| Self::new(path, model))
    }
}

/// Text, detected language and segment count from whisper's JSON result
pub(crate) fn parse_whisper_json(result: &Value) -> (String, Option<String>, usize) {
    let text = result
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let language = result
        .get("language")
        .and_then(Value::as_str)
        .map(str::to_string);
    let segments = result
        .get("segments")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    (text, language, segments)
}

fn sibling(media_file: &Path, suffix: &str) -> PathBuf {
    let stem = media_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    media_file.with_file_name(format!("{stem}{suffix}"))
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(&self, media_file: &Path, language: &str) -> crate::Result<Transcription> {
        if !tokio::fs::try_exists(media_file).await.unwrap_or(false) {
            return Err(crate::Error::NotFound(format!(
                "media file {}",
                media_file.display()
            )));
        }

        let output_dir = media_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut command = Command::new(&self.binary_path);
        command
            .arg(media_file)
            .arg("--model")
            .arg(&self.model)
            .args(["--fp16", "False"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(&output_dir);
        if language != "auto" {
            command.args(["--language", language]);
        }

        tracing::info!(file = %media_file.display(), model = %self.model, "transcribing");

        let output = command.output().await.map_err(|e| {
            crate::Error::ExternalTool(format!("Failed to execute whisper: {}", e))
        })?;

        if !output.status.success() {
            return Err(crate::Error::ExternalTool(format!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw_json = sibling(media_file, ".json");
        let contents = tokio::fs::read(&raw_json).await?;
        let result: Value = serde_json::from_slice(&contents)?;
        let (text, detected, segments) = parse_whisper_json(&result);

        let transcript_file = sibling(media_file, ".transcript.txt");
        tokio::fs::write(&transcript_file, &text).await?;
        tokio::fs::rename(&raw_json, sibling(media_file, ".transcript.json")).await?;

        Ok(Transcription {
            text,
            language: detected.or_else(|| Some(language.to_string())),
            segments,
            transcript_file: Some(transcript_file.to_string_lossy().into_owned()),
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "whisper-cli"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_language_and_segments() {
        let result = json!({
            "text": " Hello there. ",
            "language": "en",
            "segments": [{"id": 0}, {"id": 1}, {"id": 2}]
        });

        let (text, language, segments) = parse_whisper_json(&result);

        assert_eq!(text, "Hello there.");
        assert_eq!(language.as_deref(), Some("en"));
        assert_eq!(segments, 3);
    }

    #[test]
    fn missing_fields_default() {
        let (text, language, segments) = parse_whisper_json(&json!({}));

        assert!(text.is_empty());
        assert!(language.is_none());
        assert_eq!(segments, 0);
    }

    #[test]
    fn sibling_replaces_extension() {
        assert_eq!(
            sibling(Path::new("/dl/My Clip.mp4"), ".transcript.txt"),
            PathBuf::from("/dl/My Clip.transcript.txt")
        );
    }

    #[tokio::test]
    async fn missing_media_file_is_not_found() {
        let transcriber = WhisperCliTranscriber::new(PathBuf::from("/nonexistent/whisper"), "base");

        let err = transcriber
            .transcribe(Path::new("/nonexistent/clip.mp3"), "en")
            .await
            .unwrap_err();

        assert!(matches!(err, crate::Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unrunnable_binary_is_external_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp3");
        tokio::fs::write(&media, b"fake").await.unwrap();
        let transcriber =
            WhisperCliTranscriber::new(dir.path().join("no-such-whisper-binary"), "base");

        let err = transcriber.transcribe(&media, "en").await.unwrap_err();

        assert!(matches!(err, crate::Error::ExternalTool(_)));
    }
}
