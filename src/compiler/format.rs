//! Container and quality resolution

use super::{Container, Quality, Stage};

const AUDIO_BITRATES: [u32; 4] = [320, 256, 192, 128];
const DEFAULT_AUDIO_BITRATE: u32 = 192;

pub(super) struct ResolvedFormat {
    pub format_selector: String,
    pub merge_container: Option<Container>,
    pub quality: Quality,
    pub pipeline: Vec<Stage>,
}

pub(super) fn resolve(container: Container, quality: &str) -> ResolvedFormat {
    if container.is_audio() {
        return resolve_audio(container, quality);
    }

    let quality = parse_video_quality(quality);
    let pipeline = match container {
        Container::Avi => vec![Stage::VideoConvert {
            container: Container::Avi,
        }],
        _ => Vec::new(),
    };

    ResolvedFormat {
        format_selector: video_selector(container, quality),
        merge_container: Some(container),
        quality,
        pipeline,
    }
}

fn resolve_audio(codec: Container, quality: &str) -> ResolvedFormat {
    let bitrate = match codec {
        Container::Wav => None,
        _ => Some(audio_bitrate(quality)),
    };

    ResolvedFormat {
        format_selector: "bestaudio/best".to_string(),
        merge_container: None,
        quality: Quality::Best,
        pipeline: vec![Stage::AudioExtraction { codec, bitrate }],
    }
}

/// Allow-listed bitrate, or the default for anything else
pub(super) fn audio_bitrate(quality: &str) -> u32 {
    quality
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|b| AUDIO_BITRATES.contains(b))
        .unwrap_or(DEFAULT_AUDIO_BITRATE)
}

/// "best" or "<height>p"; anything unrecognised is treated as best
pub(super) fn parse_video_quality(quality: &str) -> Quality {
    let quality = quality.trim().to_ascii_lowercase();
    quality
        .strip_suffix('p')
        .and_then(|h| h.parse::<u32>().ok())
        .filter(|&h| h > 0)
        .map(Quality::Height)
        .unwrap_or(Quality::Best)
}

// Container-restricted stream filters for (video, audio), if the container has a native pair.
fn container_pair(container: Container) -> Option<(&'static str, &'static str)> {
    match container {
        Container::Mp4 => Some(("[ext=mp4]", "[ext=m4a]")),
        Container::Webm => Some(("[ext=webm]", "[ext=webm]")),
        _ => None,
    }
}

fn video_selector(container: Container, quality: Quality) -> String {
    let pair = container_pair(container);
    match (quality, pair) {
        (Quality::Best, Some((v, a))) => {
            format!("bestvideo{v}+bestaudio{a}/bestvideo+bestaudio/best")
        }
        (Quality::Best, None) => "bestvideo+bestaudio/best".to_string(),
        (Quality::Height(h), Some((v, a))) => format!(
            "bestvideo[height<={h}]{v}+bestaudio{a}/bestvideo[height<={h}]+bestaudio/best[height<={h}]"
        ),
        (Quality::Height(h), None) => {
            format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
        }
    }
}
