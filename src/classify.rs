//! Engine failure classification
//!
//! Maps raw engine failure text onto the closed [`ErrorKind`] taxonomy by ordered
//! substring matching. More specific categories are checked before the catch-all.

use crate::types::{ErrorKind, JobError};

// First match wins.
const RULES: &[(&str, ErrorKind)] = &[
    ("blocked it in your country", ErrorKind::GeoBlocked),
    ("Video unavailable", ErrorKind::ContentUnavailable),
    ("Content not available", ErrorKind::ContentUnavailable),
    ("This video has been removed", ErrorKind::ContentUnavailable),
    ("Sign in to confirm your age", ErrorKind::AgeRestricted),
];

/// Classify a raw engine failure message
///
/// Total: always returns a value. The raw message is kept as the detail.
pub fn classify(raw: &str) -> JobError {
    JobError::new(kind_of(raw), raw)
}

/// Just the kind, for callers that only need to branch on it
pub fn kind_of(raw: &str) -> ErrorKind {
    RULES
        .iter()
        .find(|(needle, _)| raw.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::DownloadFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_block_is_geo_blocked() {
        let err = classify(
            "ERROR: [youtube] abc: The uploader has not made this video available in your country; they have blocked it in your country",
        );
        assert_eq!(err.error_kind, ErrorKind::GeoBlocked);
        assert_eq!(err.message, "Video is blocked in your country");
    }

    #[test]
    fn unavailable_phrases_are_content_unavailable() {
        for raw in [
            "ERROR: [youtube] xyz: Video unavailable",
            "Content not available in this format",
            "This video has been removed by the uploader",
        ] {
            assert_eq!(
                kind_of(raw),
                ErrorKind::ContentUnavailable,
                "'{raw}' should be content_unavailable"
            );
        }
    }

    #[test]
    fn age_gate_is_age_restricted() {
        let err = classify("Sign in to confirm your age. This video may be inappropriate");
        assert_eq!(err.error_kind, ErrorKind::AgeRestricted);
    }

    #[test]
    fn anything_else_is_download_failed_with_raw_detail() {
        let raw = "HTTP Error 503: Service Unavailable";
        let err = classify(raw);

        assert_eq!(err.error_kind, ErrorKind::DownloadFailed);
        assert_eq!(err.message, "Download failed");
        assert_eq!(err.detail, raw, "raw text must be preserved");
    }

    #[test]
    fn empty_message_is_download_failed() {
        assert_eq!(kind_of(""), ErrorKind::DownloadFailed);
    }

    #[test]
    fn geo_block_wins_over_unavailable() {
        let raw = "Video unavailable: the uploader has blocked it in your country";
        assert_eq!(kind_of(raw), ErrorKind::GeoBlocked);
    }
}
