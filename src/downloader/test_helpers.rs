//! Shared test helpers for creating MediaDownloader instances in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::compiler::RequestConfig;
use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::engine::{EngineCapabilities, EngineError, EngineOutcome, FetchEngine};
use crate::progress::ProgressSender;
use crate::transcription::{NoOpTranscriber, Transcriber};
use crate::types::{JobId, JobSnapshot, MediaItem, ProbeResult, Status, Transcription};

/// What the scripted engine does for one URL
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Send the payloads, then return the outcome
    Complete {
        progress: Vec<Value>,
        outcome: EngineOutcome,
    },
    /// Return the error immediately
    Fail(EngineError),
    /// Block until the cancellation token fires
    Hang,
}

impl Script {
    /// One item with a downloading/finished progress pair
    pub(crate) fn single(title: &str) -> Self {
        Script::Complete {
            progress: vec![
                json!({"status": "downloading", "downloaded_bytes": 50, "total_bytes": 100, "speed": 10.0, "eta": 5}),
                json!({"status": "finished", "total_bytes": 100}),
            ],
            outcome: EngineOutcome::single(media_item(title)),
        }
    }
}

/// Engine that plays back a script per URL and records concurrency
pub(crate) struct ScriptedEngine {
    default: Script,
    scripts: HashMap<String, Script>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub(crate) fn new(default: Script) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchEngine for ScriptedEngine {
    async fn extract_and_download(
        &self,
        url: &str,
        _config: &RequestConfig,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let script = self.scripts.get(url).unwrap_or(&self.default).clone();
        let result = match script {
            Script::Complete { progress: events, outcome } => {
                for event in events {
                    progress.send(event).await.ok();
                }
                Ok(outcome)
            }
            Script::Fail(error) => Err(error),
            Script::Hang => {
                cancel.cancelled().await;
                Err(EngineError::Cancelled)
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn probe(&self, url: &str) -> Result<ProbeResult, EngineError> {
        match self.scripts.get(url).unwrap_or(&self.default) {
            Script::Fail(error) => Err(error.clone()),
            _ => Ok(ProbeResult {
                success: true,
                videos: vec![crate::types::VideoMetadata {
                    title: "Scripted".into(),
                    webpage_url: url.to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_download: true,
            can_probe: true,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Transcriber that succeeds unless the file name contains "broken"
pub(crate) struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, media_file: &Path, language: &str) -> crate::Result<Transcription> {
        if media_file.to_string_lossy().contains("broken") {
            return Err(crate::Error::ExternalTool("whisper exited with 1".into()));
        }
        Ok(Transcription {
            text: "hello".into(),
            language: Some(language.to_string()),
            segments: 1,
            transcript_file: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Media item named after its title
pub(crate) fn media_item(title: &str) -> MediaItem {
    MediaItem {
        title: title.to_string(),
        filename: format!("{title}.mp4"),
        format: "mp4".into(),
        quality: "best".into(),
        duration: Some(1.0),
        thumbnail_url: None,
        size: Some(100),
        index: None,
        transcription: None,
        transcription_error: None,
    }
}

/// Config rooted in a temp directory
pub(crate) fn test_config(root: &Path, max_concurrent_jobs: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.max_concurrent_jobs = max_concurrent_jobs;
    config.tools.search_path = false;
    std::fs::create_dir_all(&config.download.download_dir).unwrap();
    config
}

/// Downloader over the given engine and transcriber, ffmpeg assumed present.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_downloader_with(
    config_fn: impl FnOnce(&mut Config),
    engine: Arc<dyn FetchEngine>,
    transcriber: Arc<dyn Transcriber>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path(), 3);
    config_fn(&mut config);

    let downloader = MediaDownloader::with_components(
        config,
        engine,
        transcriber,
        Some(PathBuf::from("/usr/bin/ffmpeg")),
    );
    (downloader, temp_dir)
}

/// Helper to create a test MediaDownloader whose engine downloads one item per job.
pub(crate) fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    create_downloader_with(
        |_| {},
        Arc::new(ScriptedEngine::new(Script::single("clip"))),
        Arc::new(NoOpTranscriber),
    )
}

/// Wait until the job satisfies the predicate (5 second limit)
pub(crate) async fn wait_for(
    downloader: &MediaDownloader,
    id: JobId,
    predicate: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    let mut rx = downloader.store.watch(id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("timed out waiting for job state")
}

/// Wait until the job is completed or errored
pub(crate) async fn wait_for_terminal(downloader: &MediaDownloader, id: JobId) -> JobSnapshot {
    wait_for(downloader, id, |s| s.status.is_terminal()).await
}

/// Wait until the job reaches the given status
pub(crate) async fn wait_for_status(
    downloader: &MediaDownloader,
    id: JobId,
    status: Status,
) -> JobSnapshot {
    wait_for(downloader, id, |s| s.status == status).await
}
