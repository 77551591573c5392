//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`control`] - Job submission and cancellation
//! - [`queue_processor`] - FIFO queue draining under the worker-pool semaphore
//! - [`job_task`] - Execution of a single job
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod job_task;
mod lifecycle;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::compiler::CompileContext;
use crate::config::Config;
use crate::engine::{FetchEngine, NoOpEngine, YtDlpEngine};
use crate::error::{Error, Result};
use crate::store::JobStore;
use crate::transcription::{NoOpTranscriber, Transcriber, WhisperCliTranscriber};
use crate::types::{Capabilities, Event, JobId, JobSnapshot, ProbeResult, ToolInfo};

/// Queue and job execution state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Jobs waiting for a worker, oldest first
    pub(crate) queue: Arc<Mutex<VecDeque<JobId>>>,
    /// Semaphore to limit running jobs (respects max_concurrent_jobs config)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cancellation tokens of every queued or running job
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl QueueState {
    fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// External collaborators every job runs against
#[derive(Clone)]
pub(crate) struct Toolchain {
    /// Extraction and transfer engine
    pub(crate) engine: Arc<dyn FetchEngine>,
    /// Transcription post-processor
    pub(crate) transcriber: Arc<dyn Transcriber>,
    /// Environment requests are compiled against
    pub(crate) compile_context: Arc<CompileContext>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Per-job state cells
    /// Public for integration tests to observe job transitions
    pub store: JobStore,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Engine, transcriber and compile environment
    pub(crate) tools: Toolchain,
    /// Queue and worker state
    pub(crate) queue_state: QueueState,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Creates the download directory
    /// - Discovers yt-dlp, ffmpeg and whisper (configured paths first, then PATH)
    /// - Sets up the event broadcast channel and worker pool
    ///
    /// Missing tools degrade capabilities instead of failing: without yt-dlp every
    /// job fails with `process_failed`, without ffmpeg time ranges are ignored,
    /// without whisper transcription requests produce a warning.
    ///
    /// The queue processor is not started; call
    /// [`start_queue_processor`](Self::start_queue_processor).
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir().display(),
                        e
                    ),
                ))
            })?;

        let tools = &config.tools;

        let engine: Arc<dyn FetchEngine> =
            match tools.resolve(tools.ytdlp_path.as_ref(), "yt-dlp") {
                Some(path) => Arc::new(YtDlpEngine::new(path)),
                None => {
                    tracing::warn!("yt-dlp not found, downloads will fail until it is installed");
                    Arc::new(NoOpEngine)
                }
            };

        let ffmpeg = tools.resolve(tools.ffmpeg_path.as_ref(), "ffmpeg");
        if ffmpeg.is_none() {
            tracing::warn!("ffmpeg not found, time range requests will be ignored");
        }

        let transcriber: Arc<dyn Transcriber> =
            match tools.resolve(tools.whisper_path.as_ref(), "whisper") {
                Some(path) => Arc::new(WhisperCliTranscriber::new(
                    path,
                    tools.whisper_model.clone(),
                )),
                None => Arc::new(NoOpTranscriber),
            };

        tracing::info!(
            engine = engine.name(),
            transcriber = transcriber.name(),
            muxer_available = ffmpeg.is_some(),
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            "Media downloader initialized"
        );

        Ok(Self::with_components(config, engine, transcriber, ffmpeg))
    }

    /// Assemble a downloader from explicit collaborators
    ///
    /// `ffmpeg_location` decides whether time ranges can be honored. No tool
    /// discovery or filesystem access happens here.
    pub fn with_components(
        config: Config,
        engine: Arc<dyn FetchEngine>,
        transcriber: Arc<dyn Transcriber>,
        ffmpeg_location: Option<PathBuf>,
    ) -> Self {
        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let compile_context = CompileContext {
            output_dir: config.download_dir().clone(),
            muxer_available: ffmpeg_location.is_some(),
            ffmpeg_location,
        };

        Self {
            store: JobStore::new(),
            event_tx,
            queue_state: QueueState::new(config.download.max_concurrent_jobs),
            config: Arc::new(config),
            tools: Toolchain {
                engine,
                transcriber,
                compile_context: Arc::new(compile_context),
            },
        }
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it will receive a
    /// `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{MediaDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Snapshot of one job, or `None` for an unknown id
    pub async fn status(&self, id: JobId) -> Option<JobSnapshot> {
        self.store.snapshot(id).await
    }

    /// Snapshots of every known job, oldest first
    pub async fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.store.list().await
    }

    /// Query which external tools this instance can use
    pub fn capabilities(&self) -> Capabilities {
        let engine = &self.tools.engine;
        let transcriber = &self.tools.transcriber;

        Capabilities {
            engine: ToolInfo {
                name: engine.name().to_string(),
                available: engine.capabilities().can_download,
            },
            transcriber: ToolInfo {
                name: transcriber.name().to_string(),
                available: transcriber.is_available(),
            },
            muxer_available: self.tools.compile_context.muxer_available,
            max_concurrent_jobs: self.config.download.max_concurrent_jobs.max(1),
        }
    }

    /// Fetch metadata for a URL without creating a job
    ///
    /// Engine failures are reported in-band as `success = false` with the error
    /// text; only a missing URL is an error.
    pub async fn probe(&self, url: &str) -> Result<ProbeResult> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::config("url is required", "url"));
        }

        match self.tools.engine.probe(url).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(url, error = %e, "metadata probe failed");
                Ok(ProbeResult {
                    success: false,
                    errors: vec![e.to_string()],
                    ..Default::default()
                })
            }
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
