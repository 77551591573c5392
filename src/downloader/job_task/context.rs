//! Job task context -- shared state for one running job.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::FetchEngine;
use crate::store::JobStore;
use crate::transcription::Transcriber;
use crate::types::{Event, JobError, JobId, JobResult, Status};

use super::super::MediaDownloader;

/// Shared context for a single job task, reducing parameter passing between helpers.
pub(crate) struct JobTaskContext {
    pub(crate) id: JobId,
    pub(crate) store: JobStore,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) engine: Arc<dyn FetchEngine>,
    pub(crate) transcriber: Arc<dyn Transcriber>,
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    pub(crate) cancel_token: CancellationToken,
}

impl JobTaskContext {
    pub(crate) fn new(
        downloader: &MediaDownloader,
        id: JobId,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            store: downloader.store.clone(),
            event_tx: downloader.event_tx.clone(),
            config: downloader.config.clone(),
            engine: downloader.tools.engine.clone(),
            transcriber: downloader.tools.transcriber.clone(),
            active_jobs: downloader.queue_state.active_jobs.clone(),
            cancel_token,
        }
    }

    /// Remove this job from the active jobs map.
    pub(super) async fn remove_from_active(&self) {
        let mut active = self.active_jobs.lock().await;
        active.remove(&self.id);
    }

    /// Mark the job as failed with no per-item information and emit the failure event.
    pub(super) async fn mark_failed(&self, error: JobError) {
        self.finish_failed(JobResult::failure(error)).await;
    }

    /// Store a failure result and emit the failure event.
    ///
    /// A job that already reached a terminal status keeps its first result.
    pub(super) async fn finish_failed(&self, result: JobResult) {
        let Some(error) = result.error().cloned() else {
            return;
        };

        tracing::error!(
            job_id = %self.id,
            error_kind = error.error_kind.code(),
            detail = %error.detail,
            "job failed"
        );

        let outcome = self
            .store
            .update(self.id, move |job| {
                job.status = Status::Error;
                job.result = Some(result);
            })
            .await;

        match outcome {
            Ok(outcome) if outcome.is_applied() => {
                self.event_tx
                    .send(Event::Failed { id: self.id, error })
                    .ok();
            }
            Ok(_) => {
                tracing::debug!(job_id = %self.id, "job already finished, failure not recorded");
            }
            Err(e) => {
                tracing::error!(job_id = %self.id, error = %e, "failed to record job failure");
            }
        }
    }
}
