//! Parser for yt-dlp output

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ProbeResult, VideoMetadata};

/// Prefix of progress lines produced by `--progress-template`
pub(crate) const PROGRESS_PREFIX: &str = "media-dl-progress:";
/// Prefix of item lines produced by `--print after_move:`
pub(crate) const ITEM_PREFIX: &str = "media-dl-item:";

const DESCRIPTION_LIMIT: usize = 200;

/// A produced file as printed by yt-dlp after the final move
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct PrintedItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub playlist_index: Option<usize>,
}

/// One classified line of yt-dlp stdout
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StdoutLine {
    Progress(Value),
    Item(PrintedItem),
    /// `[download] Downloading item N of M`: the 1-based entry now being fetched
    Position(usize),
    Other,
}

/// Classify a stdout line; malformed JSON after a known prefix reads as `Other`
pub(crate) fn parse_stdout_line(line: &str) -> StdoutLine {
    let line = line.trim();
    if let Some(json) = line.strip_prefix(PROGRESS_PREFIX) {
        return match serde_json::from_str::<Value>(json) {
            Ok(value) if value.is_object() => StdoutLine::Progress(value),
            _ => StdoutLine::Other,
        };
    }
    if let Some(json) = line.strip_prefix(ITEM_PREFIX) {
        return serde_json::from_str(json)
            .map(StdoutLine::Item)
            .unwrap_or(StdoutLine::Other);
    }
    playlist_position(line)
        .map(StdoutLine::Position)
        .unwrap_or(StdoutLine::Other)
}

/// Older yt-dlp releases say "video" where newer ones say "item"
fn playlist_position(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("[download] Downloading ")?;
    let rest = rest
        .strip_prefix("item ")
        .or_else(|| rest.strip_prefix("video "))?;
    let (position, _total) = rest.split_once(" of ")?;
    position.trim().parse().ok()
}

/// The message of a stderr `ERROR:` line, if it is one
pub(crate) fn error_message(line: &str) -> Option<&str> {
    let line = line.trim();
    line.starts_with("ERROR:").then_some(line)
}

/// Build a probe result from `yt-dlp -J` output
pub(crate) fn parse_probe(info: &Value, url: &str) -> ProbeResult {
    match info.get("entries").and_then(Value::as_array) {
        Some(entries) => ProbeResult {
            success: true,
            videos: entries
                .iter()
                .filter(|e| e.is_object())
                .map(|e| video_metadata(e, url))
                .collect(),
            errors: Vec::new(),
            is_playlist: true,
            playlist_title: info.get("title").and_then(Value::as_str).map(str::to_string),
        },
        None => ProbeResult {
            success: true,
            videos: vec![video_metadata(info, url)],
            errors: Vec::new(),
            is_playlist: false,
            playlist_title: None,
        },
    }
}

fn video_metadata(info: &Value, url: &str) -> VideoMetadata {
    let text = |key: &str| info.get(key).and_then(Value::as_str);

    VideoMetadata {
        title: text("title").unwrap_or("Untitled").to_string(),
        duration: info.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        thumbnail_url: thumbnail_url(info),
        uploader: text("uploader").unwrap_or("Unknown").to_string(),
        view_count: info.get("view_count").and_then(Value::as_u64).unwrap_or(0),
        upload_date: text("upload_date").map(str::to_string),
        description: text("description")
            .map(|d| d.chars().take(DESCRIPTION_LIMIT).collect())
            .unwrap_or_default(),
        webpage_url: text("webpage_url").unwrap_or(url).to_string(),
    }
}

/// Highest resolution thumbnail: the last entry of `thumbnails`, else `thumbnail`
pub(crate) fn thumbnail_url(info: &Value) -> Option<String> {
    info.get("thumbnails")
        .and_then(Value::as_array)
        .and_then(|thumbs| thumbs.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .or_else(|| info.get("thumbnail").and_then(Value::as_str))
        .map(str::to_string)
}
