//! CLI-based engine using the external yt-dlp binary

use super::parser::{
    ITEM_PREFIX, PROGRESS_PREFIX, PrintedItem, StdoutLine, error_message, parse_probe,
    parse_stdout_line,
};
use super::traits::{EngineCapabilities, EngineError, EngineOutcome, EntryOutcome, FetchEngine};
use crate::classify::kind_of;
use crate::compiler::{RequestConfig, Stage};
use crate::progress::ProgressSender;
use crate::types::{ErrorKind, MediaItem, ProbeResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PROGRESS_FIELDS: &str = "status,downloaded_bytes,total_bytes,total_bytes_estimate,speed,eta,filename";
const ITEM_FIELDS: &str = "title,filepath,duration,thumbnail,playlist_index";

/// CLI-based engine driving an external `yt-dlp` process
///
/// Progress is read from `--progress-template` lines and produced files from
/// `--print after_move:` lines, both emitted as JSON on stdout. `ERROR:` lines
/// on stderr become per-entry failures, or skips when the content is simply
/// unavailable.
///
/// # Examples
///
/// ```no_run
/// use media_dl::engine::{FetchEngine, YtDlpEngine};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// let info = engine.probe("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
/// println!("{} video(s)", info.videos.len());
/// # Ok(())
/// # }
/// ```
pub struct YtDlpEngine {
    binary_path: PathBuf,
}

impl YtDlpEngine {
    /// Create a new engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the binary this engine runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

/// Command-line arguments for one download
pub fn build_args(url: &str, config: &RequestConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress".into(),
        "--no-simulate".into(),
        "--no-quiet".into(),
        "--ignore-errors".into(),
        "--progress-template".into(),
        format!("download:{PROGRESS_PREFIX}%(progress.{{{PROGRESS_FIELDS}}})j"),
        "--print".into(),
        format!("after_move:{ITEM_PREFIX}%(.{{{ITEM_FIELDS}}})j"),
        "-f".into(),
        config.format_selector.clone(),
    ];

    if let Some(merge) = config.merge_container {
        args.extend(["--merge-output-format".into(), merge.to_string()]);
    }
    args.extend(["-o".into(), config.output.template.clone()]);

    let output = &config.output;
    for (enabled, flag) in [
        (output.write_thumbnail, "--write-thumbnail"),
        (output.write_info_json, "--write-info-json"),
        (output.geo_bypass, "--geo-bypass"),
        (output.skip_unavailable_fragments, "--skip-unavailable-fragments"),
        (output.force_overwrites, "--force-overwrites"),
    ] {
        if enabled {
            args.push(flag.into());
        }
    }

    for stage in &config.pipeline {
        match stage {
            Stage::AudioExtraction { codec, bitrate } => {
                args.extend(["-x".into(), "--audio-format".into(), codec.to_string()]);
                if let Some(bitrate) = bitrate {
                    args.extend(["--audio-quality".into(), format!("{bitrate}K")]);
                }
            }
            Stage::Remux { container } => {
                args.extend(["--remux-video".into(), container.to_string()]);
            }
            Stage::VideoConvert { container } => {
                args.extend(["--recode-video".into(), container.to_string()]);
            }
        }
    }

    if let Some(subs) = &config.subtitles {
        args.extend([
            "--write-subs".into(),
            "--sub-langs".into(),
            subs.language.clone(),
            "--sub-format".into(),
            subs.format.clone(),
        ]);
        if subs.automatic {
            args.push("--write-auto-subs".into());
        }
    }

    if let Some(range) = config.time_range {
        let start = range.start.unwrap_or(0);
        let end = range
            .end
            .map(|e| e.to_string())
            .unwrap_or_else(|| "inf".to_string());
        args.extend(["--download-sections".into(), format!("*{start}-{end}")]);
    }

    if let Some(n) = config.network.fragment_concurrency {
        args.extend(["--concurrent-fragments".into(), n.to_string()]);
    }
    if let Some(bytes) = config.network.chunk_size_bytes {
        args.extend(["--http-chunk-size".into(), bytes.to_string()]);
    }

    if let Some(ffmpeg) = &config.ffmpeg_location {
        args.extend([
            "--ffmpeg-location".into(),
            ffmpeg.to_string_lossy().into_owned(),
        ]);
    }

    args.extend(["--".into(), url.to_string()]);
    args
}

async fn collect_errors<R>(stream: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut errors = Vec::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match error_message(&line) {
            Some(message) => errors.push(message.to_string()),
            None => tracing::trace!(line = %line, "yt-dlp stderr"),
        }
    }
    errors
}

async fn abort(child: &mut Child, stderr_task: JoinHandle<Vec<String>>) -> EngineError {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "failed to kill yt-dlp");
    }
    child.wait().await.ok();
    stderr_task.abort();
    EngineError::Cancelled
}

/// What a run printed on stdout, besides progress
#[derive(Debug, Default)]
pub(crate) struct RunOutput {
    printed: Vec<PrintedItem>,
    /// Playlist positions announced by `Downloading item N of M`, first sighting order
    announced: Vec<usize>,
}

impl RunOutput {
    /// Record one stdout line, handing back its progress payload if it has one
    fn observe(&mut self, line: &str) -> Option<Value> {
        match parse_stdout_line(line) {
            StdoutLine::Progress(payload) => return Some(payload),
            StdoutLine::Position(position) => {
                if !self.announced.contains(&position) {
                    self.announced.push(position);
                }
            }
            StdoutLine::Item(mut item) => {
                if item.playlist_index.is_none() {
                    item.playlist_index = self.announced.last().copied();
                }
                self.printed.push(item);
            }
            StdoutLine::Other => {}
        }
        None
    }

    /// Positions of entries that printed no item, for the stderr errors in order
    ///
    /// Announced positions come first. Past those, the 1-based ordinals no
    /// printed item occupies are used, so an error never shares a position with
    /// a downloaded entry.
    fn error_positions(&self, errors: usize) -> Vec<usize> {
        let done: HashSet<usize> = self
            .printed
            .iter()
            .enumerate()
            .map(|(i, item)| item.playlist_index.unwrap_or(i + 1))
            .collect();

        let unprinted: Vec<usize> = self
            .announced
            .iter()
            .copied()
            .filter(|p| !done.contains(p))
            .collect();
        let unoccupied = (1..).filter(|p| !done.contains(p) && !unprinted.contains(p));

        unprinted
            .iter()
            .copied()
            .chain(unoccupied)
            .take(errors)
            .collect()
    }
}

/// Turn printed items and stderr errors into entry outcomes
///
/// A run that produced nothing and reported exactly one error is a failure of
/// the whole call, so a single unavailable video is classified rather than
/// counted as a skipped playlist entry.
pub(crate) async fn assemble(
    config: &RequestConfig,
    output: RunOutput,
    errors: Vec<String>,
    exit_ok: bool,
) -> Result<EngineOutcome, EngineError> {
    if output.printed.is_empty() {
        match errors.as_slice() {
            [only] => return Err(EngineError::Download(only.clone())),
            [] if !exit_ok => {
                return Err(EngineError::Download(
                    "yt-dlp exited with an error and produced nothing".into(),
                ));
            }
            _ => {}
        }
    }

    let positions = output.error_positions(errors.len());
    let mut entries = Vec::with_capacity(output.printed.len() + errors.len());
    for (position, item) in output.printed.into_iter().enumerate() {
        entries.push(EntryOutcome::Downloaded(
            media_item(config, item, position + 1).await,
        ));
    }

    for (message, index) in errors.into_iter().zip(positions) {
        let outcome = match kind_of(&message) {
            ErrorKind::ContentUnavailable => EntryOutcome::Skipped {
                index,
                reason: message,
            },
            _ => EntryOutcome::Failed { index, message },
        };
        entries.push(outcome);
    }

    Ok(EngineOutcome { entries })
}

async fn media_item(config: &RequestConfig, item: PrintedItem, position: usize) -> MediaItem {
    let path = item.filepath.as_deref().map(Path::new);
    let size = match path {
        Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len()),
        None => None,
    };
    let filename = path
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    MediaItem {
        title: item.title.unwrap_or_else(|| "Untitled".to_string()),
        filename,
        format: config.container.to_string(),
        quality: config.requested_quality.clone(),
        duration: item.duration,
        thumbnail_url: item.thumbnail,
        size,
        index: Some(item.playlist_index.unwrap_or(position)),
        transcription: None,
        transcription_error: None,
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    async fn extract_and_download(
        &self,
        url: &str,
        config: &RequestConfig,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        let args = build_args(url, config);
        tracing::debug!(binary = %self.binary_path.display(), ?args, "spawning yt-dlp");

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Process(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Process("yt-dlp stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Process("yt-dlp stderr not captured".into()))?;
        let stderr_task = tokio::spawn(collect_errors(stderr));

        let mut lines = BufReader::new(stdout).lines();
        let mut output = RunOutput::default();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => None,
                line = lines.next_line() => Some(line),
            };
            let Some(line) = line else {
                return Err(abort(&mut child, stderr_task).await);
            };

            match line {
                Ok(Some(line)) => {
                    if let Some(payload) = output.observe(&line) {
                        progress.send(payload).await.ok();
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    abort(&mut child, stderr_task).await;
                    return Err(EngineError::Process(format!(
                        "Failed to read yt-dlp output: {}",
                        e
                    )));
                }
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            return Err(abort(&mut child, stderr_task).await);
        };
        let status =
            status.map_err(|e| EngineError::Process(format!("Failed to wait for yt-dlp: {}", e)))?;
        let errors = stderr_task.await.unwrap_or_default();

        tracing::debug!(
            exit = ?status.code(),
            items = output.printed.len(),
            errors = errors.len(),
            "yt-dlp finished"
        );

        assemble(config, output, errors, status.success()).await
    }

    async fn probe(&self, url: &str) -> Result<ProbeResult, EngineError> {
        let output = Command::new(&self.binary_path)
            .args(["-J", "--skip-download", "--no-warnings", "--", url])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Process(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .filter_map(error_message)
                .last()
                .unwrap_or_else(|| stderr.trim())
                .to_string();
            return Err(EngineError::Download(message));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::Process(format!("Malformed yt-dlp JSON: {}", e)))?;
        Ok(parse_probe(&info, url))
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_download: true,
            can_probe: true,
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
