//! Job orchestration -- top-level lifecycle for a single job.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::compiler::RequestConfig;
use crate::engine::{EngineError, EngineOutcome};
use crate::progress::{ProgressSender, ProgressTranslator};
use crate::types::{ErrorKind, Event, JobError, Status};

use super::context::JobTaskContext;
use super::finalization::finalize_job;

/// Why an engine call produced no outcome
#[derive(Debug)]
pub(super) enum RunFailure {
    /// The engine itself reported a failure
    Engine(EngineError),
    /// The call exceeded `download.job_timeout`
    TimedOut(Duration),
}

impl RunFailure {
    /// Classified error stored on the job
    pub(super) fn into_job_error(self) -> JobError {
        match self {
            RunFailure::Engine(EngineError::Download(message)) => crate::classify::classify(&message),
            RunFailure::Engine(EngineError::Process(message)) => {
                JobError::new(ErrorKind::ProcessFailed, message)
            }
            RunFailure::Engine(EngineError::Cancelled) => {
                JobError::new(ErrorKind::Cancelled, "cancelled while running")
            }
            RunFailure::TimedOut(limit) => JobError::new(
                ErrorKind::Cancelled,
                format!("timed out after {}s", limit.as_secs()),
            ),
        }
    }
}

/// Core job task -- orchestrates the full lifecycle of a single job.
///
/// Phases:
/// 1. Stop early if the job was cancelled while queued
/// 2. Transition to Starting
/// 3. Start the progress translator
/// 4. Run the engine call (bounded by the optional job timeout)
/// 5. Drain the translator
/// 6. Finalize from the engine outcome
pub(crate) async fn run_job_task(ctx: JobTaskContext) {
    let id = ctx.id;

    // Phase 1: cancelled before a worker picked it up
    if ctx.cancel_token.is_cancelled() {
        ctx.mark_failed(JobError::new(ErrorKind::Cancelled, "cancelled while queued"))
            .await;
        ctx.remove_from_active().await;
        return;
    }

    let Some(request_config) = ctx.store.request_config(id).await else {
        tracing::error!(job_id = %id, "queued job is missing from the store");
        ctx.remove_from_active().await;
        return;
    };

    // Phase 2: Starting
    let started = ctx
        .store
        .update(id, |job| {
            job.status = Status::Starting;
            job.started_at = Some(Utc::now());
        })
        .await;
    match started {
        Ok(outcome) if outcome.is_applied() => {}
        Ok(_) => {
            tracing::debug!(job_id = %id, "job finished before it could start");
            ctx.remove_from_active().await;
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "failed to start job");
            ctx.remove_from_active().await;
            return;
        }
    }
    ctx.event_tx.send(Event::Starting { id }).ok();
    tracing::info!(job_id = %id, url = %request_config.url, "job started");

    // Phase 3: progress channel and translator
    let (progress_tx, progress_rx) = mpsc::channel(ctx.config.download.progress_buffer.max(1));
    let translator = ProgressTranslator::new(
        ctx.store.clone(),
        id,
        ctx.config.download.unknown_total_divisor_bytes,
        ctx.event_tx.clone(),
    )
    .spawn(progress_rx);

    // Phase 4: engine call
    let outcome = run_engine(&ctx, &request_config, progress_tx).await;

    // Phase 5: every sender is gone once the call returns
    if let Err(e) = translator.await {
        tracing::warn!(job_id = %id, error = %e, "progress translator task failed");
    }

    // Phase 6: final status
    finalize_job(ctx, &request_config, outcome).await;
}

async fn run_engine(
    ctx: &JobTaskContext,
    config: &RequestConfig,
    progress: ProgressSender,
) -> Result<EngineOutcome, RunFailure> {
    let call =
        ctx.engine
            .extract_and_download(&config.url, config, progress, ctx.cancel_token.clone());

    match ctx.config.download.job_timeout {
        None => call.await.map_err(RunFailure::Engine),
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(RunFailure::Engine),
            Err(_) => {
                tracing::warn!(job_id = %ctx.id, timeout_secs = limit.as_secs(), "job timed out");
                ctx.cancel_token.cancel();
                Err(RunFailure::TimedOut(limit))
            }
        },
    }
}
