//! Job execution -- one worker task per running job.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state for a single job task
//! - [`orchestration`] - Top-level job lifecycle and the engine call
//! - [`finalization`] - Outcome evaluation, transcription and final status

mod context;
mod finalization;
mod orchestration;

pub(crate) use context::JobTaskContext;
pub(crate) use orchestration::run_job_task;
