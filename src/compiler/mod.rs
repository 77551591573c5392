//! Request compilation
//!
//! Turns a user-supplied [`DownloadRequest`] into an immutable, fully-resolved
//! [`RequestConfig`]. Compilation is pure: it never touches the network or the
//! filesystem. Environment facts (output directory, muxer availability) arrive
//! through [`CompileContext`].

mod format;
mod time_range;

pub use time_range::parse_time;

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Target container (video) or codec (audio-only)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MPEG-4 video
    Mp4,
    /// Matroska video
    Mkv,
    /// AVI video (converted after merge)
    Avi,
    /// WebM video
    Webm,
    /// MP3 audio
    Mp3,
    /// AAC audio
    Aac,
    /// WAV audio
    Wav,
}

impl Container {
    /// Parse a user-supplied container name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp4" => Some(Container::Mp4),
            "mkv" => Some(Container::Mkv),
            "avi" => Some(Container::Avi),
            "webm" => Some(Container::Webm),
            "mp3" => Some(Container::Mp3),
            "aac" => Some(Container::Aac),
            "wav" => Some(Container::Wav),
            _ => None,
        }
    }

    /// Whether this target produces audio only
    pub fn is_audio(&self) -> bool {
        matches!(self, Container::Mp3 | Container::Aac | Container::Wav)
    }

    /// Lowercase name, also used as the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Avi => "avi",
            Container::Webm => "webm",
            Container::Mp3 => "mp3",
            Container::Aac => "aac",
            Container::Wav => "wav",
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved quality ceiling for video targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    /// No ceiling
    Best,
    /// Maximum height in pixels
    Height(u32),
}

/// One post-processing stage, applied in pipeline order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Extract the audio track with the given codec
    AudioExtraction {
        /// Output codec
        codec: Container,
        /// Bitrate in kbit/s (None for lossless targets)
        bitrate: Option<u32>,
    },
    /// Re-wrap streams into a container without re-encoding
    Remux {
        /// Output container
        container: Container,
    },
    /// Re-encode video into a container
    VideoConvert {
        /// Output container
        container: Container,
    },
}

/// Subtitle fetch directive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleDirective {
    /// Subtitle language code
    pub language: String,
    /// Subtitle file format
    pub format: String,
    /// Also fetch machine-generated subtitles
    pub automatic: bool,
}

/// Section of the media to fetch, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    /// Start offset (None = from the beginning)
    pub start: Option<u64>,
    /// End offset (None = to the end)
    pub end: Option<u64>,
}

/// Transfer tuning directives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkDirectives {
    /// Fragments fetched in parallel
    pub fragment_concurrency: Option<u32>,
    /// HTTP chunk size in bytes
    pub chunk_size_bytes: Option<u64>,
}

/// Fixed output directives applied to every job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDirectives {
    /// Output path template understood by the engine
    pub template: String,
    /// Save the thumbnail next to the media file
    pub write_thumbnail: bool,
    /// Save the engine's info JSON next to the media file
    pub write_info_json: bool,
    /// Ask the engine to work around geographic restrictions
    pub geo_bypass: bool,
    /// Continue when individual fragments are unavailable
    pub skip_unavailable_fragments: bool,
    /// Overwrite existing files
    pub force_overwrites: bool,
}

/// Transcription directive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptionDirective {
    /// Language hint handed to the transcriber
    pub language: String,
}

/// Non-fatal condition detected at compile time
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileWarning {
    /// A time range was requested but no muxer is available, so it is ignored
    MuxerUnavailable {
        /// Requested start offset
        start: Option<u64>,
        /// Requested end offset
        end: Option<u64>,
    },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileWarning::MuxerUnavailable { .. } => {
                f.write_str("ffmpeg is required for time range downloads; the range was ignored")
            }
        }
    }
}

/// Compiled, engine-facing configuration for one job
#[derive(Clone, Debug, PartialEq)]
pub struct RequestConfig {
    /// Validated source URL
    pub url: String,
    /// Target container or audio codec
    pub container: Container,
    /// Container the engine merges separate streams into (video targets only)
    pub merge_container: Option<Container>,
    /// Format-selection expression
    pub format_selector: String,
    /// Quality ceiling
    pub quality: Quality,
    /// Quality exactly as requested, reported back on produced items
    pub requested_quality: String,
    /// Subtitle directive, if subtitles were requested
    pub subtitles: Option<SubtitleDirective>,
    /// Time range, if requested and a muxer is available
    pub time_range: Option<TimeRange>,
    /// Transfer tuning
    pub network: NetworkDirectives,
    /// Ordered post-processing pipeline
    pub pipeline: Vec<Stage>,
    /// Fixed output directives
    pub output: OutputDirectives,
    /// Muxer location, if known
    pub ffmpeg_location: Option<PathBuf>,
    /// Transcription directive, if requested
    pub transcription: Option<TranscriptionDirective>,
    /// Non-fatal compile warnings
    pub warnings: Vec<CompileWarning>,
}

/// Environment facts the compiler needs, gathered once at startup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileContext {
    /// Directory produced files are written to
    pub output_dir: PathBuf,
    /// Muxer binary, if discovered or configured
    pub ffmpeg_location: Option<PathBuf>,
    /// Whether the muxer can be used
    pub muxer_available: bool,
}

/// Subtitle options from the advanced request block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubtitleOptions {
    /// Subtitle language (default: "en")
    #[serde(default)]
    pub language: Option<String>,
    /// Subtitle format (default: "srt")
    #[serde(default)]
    pub format: Option<String>,
    /// Also fetch machine-generated subtitles
    #[serde(default)]
    pub translate: bool,
}

/// Time range from the advanced request block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeRangeOptions {
    /// Start as `HH:MM:SS`, `MM:SS` or seconds
    #[serde(default)]
    pub start: Option<String>,
    /// End as `HH:MM:SS`, `MM:SS` or seconds
    #[serde(default)]
    pub end: Option<String>,
}

/// Network settings from the advanced request block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NetworkSettings {
    /// Parallel fragment downloads (values ≤ 1 are ignored)
    #[serde(default, deserialize_with = "lenient_u64")]
    pub concurrent: Option<u64>,
    /// HTTP chunk size in megabytes (0 is ignored)
    #[serde(default, deserialize_with = "lenient_u64")]
    pub segment_size: Option<u64>,
}

/// Advanced request options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    /// Subtitle options
    #[serde(default)]
    pub subtitle_options: SubtitleOptions,
    /// Time range options
    #[serde(default)]
    pub time_range: TimeRangeOptions,
    /// Network settings
    #[serde(default)]
    pub network_settings: NetworkSettings,
}

/// A user's media-fetch request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Media or playlist URL
    #[serde(default)]
    pub url: String,
    /// Target container (default: "mp4")
    #[serde(default = "default_format")]
    pub format: String,
    /// Quality: "best", a height like "720p", or an audio bitrate like "320" (default: "best")
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Fetch subtitles
    #[serde(default)]
    pub subtitles: bool,
    /// Transcribe produced files
    #[serde(default)]
    pub transcribe: bool,
    /// Advanced options
    #[serde(default)]
    pub advanced_options: AdvancedOptions,
}

impl DownloadRequest {
    /// Request with default options for a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: default_format(),
            quality: default_quality(),
            subtitles: false,
            transcribe: false,
            advanced_options: AdvancedOptions::default(),
        }
    }
}

fn default_format() -> String {
    "mp4".to_string()
}

fn default_quality() -> String {
    "best".to_string()
}

const DEFAULT_SUBTITLE_LANGUAGE: &str = "en";
const DEFAULT_SUBTITLE_FORMAT: &str = "srt";

// Accepts a JSON number or a numeric string; blank strings read as absent.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Compile a request into an engine configuration
///
/// Fails with [`Error::Config`] for an invalid URL, an unknown container, or a
/// malformed time range. Identical inputs always compile to equal outputs.
pub fn compile(request: &DownloadRequest, context: &CompileContext) -> Result<RequestConfig> {
    let url = validate_url(&request.url)?;

    let container = Container::parse(&request.format).ok_or_else(|| {
        Error::config(
            format!("unsupported format '{}'", request.format),
            "format",
        )
    })?;

    let resolved = format::resolve(container, &request.quality);
    let mut pipeline = resolved.pipeline;
    let mut warnings = Vec::new();

    let advanced = &request.advanced_options;
    let language = advanced
        .subtitle_options
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_SUBTITLE_LANGUAGE)
        .to_string();

    let subtitles = request.subtitles.then(|| SubtitleDirective {
        language: language.clone(),
        format: advanced
            .subtitle_options
            .format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_SUBTITLE_FORMAT)
            .to_string(),
        automatic: advanced.subtitle_options.translate,
    });

    let mut time_range = time_range::resolve(&advanced.time_range)?;
    if let Some(range) = time_range {
        pipeline.insert(0, Stage::Remux { container });
        if !context.muxer_available {
            warnings.push(CompileWarning::MuxerUnavailable {
                start: range.start,
                end: range.end,
            });
            time_range = None;
        }
    }

    let network = resolve_network(&advanced.network_settings);

    Ok(RequestConfig {
        url,
        container,
        merge_container: resolved.merge_container,
        format_selector: resolved.format_selector,
        quality: resolved.quality,
        requested_quality: request.quality.clone(),
        subtitles,
        time_range,
        network,
        pipeline,
        output: OutputDirectives {
            template: context
                .output_dir
                .join("%(title)s.%(ext)s")
                .to_string_lossy()
                .into_owned(),
            write_thumbnail: true,
            write_info_json: true,
            geo_bypass: true,
            skip_unavailable_fragments: true,
            force_overwrites: true,
        },
        ffmpeg_location: context.ffmpeg_location.clone(),
        transcription: request
            .transcribe
            .then(|| TranscriptionDirective { language }),
        warnings,
    })
}

fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::config("no URL provided", "url"));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::config(format!("invalid URL '{trimmed}': {e}"), "url"))?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(Error::config(
            format!("unsupported URL scheme '{other}'"),
            "url",
        )),
    }
}

fn resolve_network(settings: &NetworkSettings) -> NetworkDirectives {
    let fragment_concurrency = settings
        .concurrent
        .filter(|&n| n > 1)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

    let chunk_size_bytes = settings
        .segment_size
        .filter(|&mb| mb > 0)
        .map(|mb| mb.saturating_mul(1024 * 1024));

    NetworkDirectives {
        fragment_concurrency,
        chunk_size_bytes,
    }
}
