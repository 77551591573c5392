//! Transcription post-processing
//!
//! - [`WhisperCliTranscriber`]: runs the external `whisper` CLI
//! - [`NoOpTranscriber`]: reports transcription as unavailable

mod noop;
mod traits;
mod whisper;

pub use noop::NoOpTranscriber;
pub use traits::Transcriber;
pub use whisper::WhisperCliTranscriber;
