//! # media-dl
//!
//! Asynchronous media download service built around an external extraction engine.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - The REST API is an optional surface over the same handle
//! - **Tool-agnostic** - yt-dlp and whisper sit behind traits and can be swapped out
//! - **Event-driven** - Consumers subscribe to events or watch job cells, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!     let _processor = downloader.start_queue_processor();
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request: DownloadRequest = serde_json::from_str(
//!         r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "format": "mp3"}"#,
//!     )?;
//!     let id = downloader.submit(request).await?;
//!     println!("queued {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Engine error text classification
pub mod classify;
/// Request compilation into engine configurations
pub mod compiler;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Extraction engines
pub mod engine;
/// Error types
pub mod error;
/// Engine progress translation
pub mod progress;
/// Per-job state store
pub mod store;
/// Transcription post-processing
pub mod transcription;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use classify::classify;
pub use compiler::{CompileContext, DownloadRequest, RequestConfig, compile};
pub use config::Config;
pub use downloader::MediaDownloader;
pub use engine::{EngineError, EngineOutcome, EntryOutcome, FetchEngine};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use store::JobStore;
pub use transcription::Transcriber;
pub use types::{
    Capabilities, ErrorKind, Event, JobError, JobId, JobResult, JobSnapshot, MediaItem,
    ProbeResult, Status, VideoMetadata,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     let _processor = downloader.start_queue_processor();
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register one signal handler, waiting on the other");
            only.recv().await;
            tracing::info!("Received termination signal, shutting down");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
