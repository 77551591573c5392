//! Job submission and cancellation.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use crate::compiler::{DownloadRequest, compile};
use crate::error::{Error, Result};
use crate::types::{ErrorKind, Event, JobError, JobId, JobResult, Status};

use super::MediaDownloader;

impl MediaDownloader {
    /// Compile a request, create its job and queue it for execution
    ///
    /// Returns as soon as the job is queued; execution happens on the worker pool.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the request does not compile (no job is created)
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started; a
    ///   job created while shutdown began is left `error(cancelled)`
    pub async fn submit(&self, request: DownloadRequest) -> Result<JobId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let config = compile(&request, &self.tools.compile_context)?;
        let warnings: Vec<String> = config.warnings.iter().map(ToString::to_string).collect();
        let url = config.url.clone();

        let id = self.store.create(url.clone(), Arc::new(config)).await;

        if !warnings.is_empty() {
            for warning in &warnings {
                tracing::warn!(job_id = %id, warning = %warning, "request compiled with warning");
            }
            self.store
                .update(id, move |job| job.warnings.extend(warnings))
                .await?;
        }

        self.enqueue(id, url).await?;
        Ok(id)
    }

    /// Register a created job for execution
    ///
    /// The shutdown flag is read again under the queue lock, the same lock
    /// `cancel_all` drains under.
    pub(crate) async fn enqueue(&self, id: JobId, url: String) -> Result<()> {
        let mut queue = self.queue_state.queue.lock().await;
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            drop(queue);
            tracing::info!(job_id = %id, "shutdown began before the job was queued");
            self.fail_queued(id, "shutdown in progress").await;
            return Err(Error::ShuttingDown);
        }
        self.queue_state
            .active_jobs
            .lock()
            .await
            .insert(id, CancellationToken::new());
        queue.push_back(id);
        drop(queue);

        tracing::info!(job_id = %id, url = %url, "job queued");
        self.emit_event(Event::Queued { id, url });
        Ok(())
    }

    /// Cancel a queued or running job
    ///
    /// A queued job is failed immediately and never starts. A running job has its
    /// engine call cancelled and ends `error(cancelled)`.
    ///
    /// Returns `false` if the job had already finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn cancel(&self, id: JobId) -> Result<bool> {
        let snapshot = self
            .store
            .snapshot(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("job {id}")))?;

        if snapshot.status.is_terminal() {
            return Ok(false);
        }

        let token = self.queue_state.active_jobs.lock().await.get(&id).cloned();
        let Some(token) = token else {
            return Ok(false);
        };

        token.cancel();
        tracing::info!(job_id = %id, status = %snapshot.status, "job cancellation requested");

        if snapshot.status == Status::Queued {
            self.fail_queued(id, "cancelled while queued").await;
        }

        Ok(true)
    }

    /// Drop a cancelled job that never got a worker
    pub(crate) async fn finish_cancelled_in_queue(&self, id: JobId) {
        self.queue_state.active_jobs.lock().await.remove(&id);
        self.fail_queued(id, "cancelled while queued").await;
    }

    /// Fail a job with `cancelled` if it is still queued
    async fn fail_queued(&self, id: JobId, detail: &str) -> bool {
        let error = JobError::new(ErrorKind::Cancelled, detail);
        let result = JobResult::failure(error.clone());

        let outcome = self
            .store
            .update(id, move |job| {
                if job.status == Status::Queued {
                    job.status = Status::Error;
                    job.result = Some(result);
                }
            })
            .await;

        match outcome {
            Ok(outcome) if outcome.is_applied() => {
                tracing::info!(job_id = %id, "queued job cancelled");
                self.emit_event(Event::Failed { id, error });
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "failed to cancel queued job");
                false
            }
        }
    }
}
