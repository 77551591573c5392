//! Common test utilities for media-dl integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use media_dl::engine::EngineCapabilities;
use media_dl::progress::ProgressSender;
use media_dl::transcription::NoOpTranscriber;
use media_dl::{
    Config, EngineError, EngineOutcome, EntryOutcome, FetchEngine, JobId, JobSnapshot,
    MediaDownloader, MediaItem, ProbeResult, RequestConfig,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// How the fake engine behaves for a URL, chosen by substring
///
/// - contains `hang` - waits for cancellation
/// - contains `playlist` - five entries, entries 2 and 4 skipped
/// - contains `private` - typed "Video unavailable" failure
/// - anything else - one item after a few progress payloads
pub struct FakeEngine {
    running: AtomicUsize,
    max_running: AtomicUsize,
    /// Delay between progress payloads
    step: Duration,
}

impl FakeEngine {
    pub fn new(step: Duration) -> Self {
        Self {
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            step,
        }
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn run(
        &self,
        url: &str,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        if url.contains("hang") {
            cancel.cancelled().await;
            return Err(EngineError::Cancelled);
        }
        if url.contains("private") {
            return Err(EngineError::Download(
                "ERROR: [youtube] abc: Video unavailable. This video is private".to_string(),
            ));
        }

        if url.contains("playlist") {
            let mut entries = Vec::new();
            for index in 1..=5 {
                if index % 2 == 0 {
                    entries.push(EntryOutcome::Skipped {
                        index,
                        reason: "Video unavailable".to_string(),
                    });
                    continue;
                }
                self.transfer(&progress, &cancel).await?;
                let mut media = item(&format!("entry-{index}"));
                media.index = Some(index);
                entries.push(EntryOutcome::Downloaded(media));
            }
            return Ok(EngineOutcome { entries });
        }

        self.transfer(&progress, &cancel).await?;
        Ok(EngineOutcome::single(item("clip")))
    }

    async fn transfer(
        &self,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        for downloaded in [250u64, 500, 750, 1000] {
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(self.step) => {}
            }
            progress
                .send(json!({
                    "status": "downloading",
                    "downloaded_bytes": downloaded,
                    "total_bytes": 1000,
                    "speed": 1000.0,
                }))
                .await
                .ok();
        }
        progress
            .send(json!({"status": "finished", "total_bytes": 1000}))
            .await
            .ok();
        Ok(())
    }
}

#[async_trait]
impl FetchEngine for FakeEngine {
    async fn extract_and_download(
        &self,
        url: &str,
        _config: &RequestConfig,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let result = self.run(url, progress, cancel).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn probe(&self, _url: &str) -> Result<ProbeResult, EngineError> {
        Ok(ProbeResult {
            success: true,
            ..Default::default()
        })
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_download: true,
            can_probe: true,
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn item(title: &str) -> MediaItem {
    MediaItem {
        title: title.to_string(),
        filename: format!("{title}.mp4"),
        format: "mp4".to_string(),
        quality: "best".to_string(),
        duration: Some(10.0),
        thumbnail_url: None,
        size: Some(1000),
        index: None,
        transcription: None,
        transcription_error: None,
    }
}

/// Started downloader over a [`FakeEngine`]
pub fn create_downloader(
    max_concurrent_jobs: usize,
) -> (Arc<MediaDownloader>, Arc<FakeEngine>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_jobs = max_concurrent_jobs;
    config.tools.search_path = false;

    let engine = Arc::new(FakeEngine::new(Duration::from_millis(20)));
    let downloader = MediaDownloader::with_components(
        config,
        engine.clone(),
        Arc::new(NoOpTranscriber),
        Some(PathBuf::from("/usr/bin/ffmpeg")),
    );
    let downloader = Arc::new(downloader);
    downloader.start_queue_processor();

    (downloader, engine, temp_dir)
}

pub async fn submit(downloader: &MediaDownloader, url: &str) -> JobId {
    let request = serde_json::from_value(json!({ "url": url })).unwrap();
    downloader.submit(request).await.unwrap()
}

/// Every distinct snapshot the job passes through, until it is terminal
pub async fn observe_until_terminal(downloader: &MediaDownloader, id: JobId) -> Vec<JobSnapshot> {
    let mut rx = downloader.store.watch(id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut seen = Vec::new();
        loop {
            let snapshot = rx.borrow_and_update().snapshot();
            let terminal = snapshot.status.is_terminal();
            if seen.last() != Some(&snapshot) {
                seen.push(snapshot);
            }
            if terminal {
                return seen;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("job did not finish in time")
}

pub async fn wait_for_terminal(downloader: &MediaDownloader, id: JobId) -> JobSnapshot {
    observe_until_terminal(downloader, id)
        .await
        .pop()
        .unwrap()
}
