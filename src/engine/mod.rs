//! Fetch engines
//!
//! The core abstraction is the [`FetchEngine`] trait: one call extracts,
//! negotiates formats, transfers and muxes everything a URL refers to, reporting
//! progress as JSON payloads on a channel while it runs.
//!
//! - [`YtDlpEngine`]: drives an external `yt-dlp` binary
//! - [`NoOpEngine`]: fallback when no engine binary is available
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::compiler::{CompileContext, DownloadRequest, compile};
//! use media_dl::engine::{FetchEngine, YtDlpEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = YtDlpEngine::from_path().expect("yt-dlp binary not found");
//!     let request = DownloadRequest::new("https://example.com/watch?v=abc");
//!     let config = compile(&request, &CompileContext::default())?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             println!("{event}");
//!         }
//!     });
//!
//!     let outcome = engine
//!         .extract_and_download(&config.url, &config, tx, CancellationToken::new())
//!         .await?;
//!     println!("{} entries", outcome.entries.len());
//!     Ok(())
//! }
//! ```

mod noop;
pub(crate) mod parser;
mod traits;
mod ytdlp;

pub use noop::NoOpEngine;
pub use traits::{EngineCapabilities, EngineError, EngineOutcome, EntryOutcome, FetchEngine};
pub use ytdlp::{YtDlpEngine, build_args};
