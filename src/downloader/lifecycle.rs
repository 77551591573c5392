//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::MediaDownloader;

/// Upper bound on waiting for running jobs to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs ([`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Fails every queued job and cancels every running one
    /// 3. Waits for running jobs to finish with a timeout (30 seconds)
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.cancel_all().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All running jobs finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for jobs to finish, proceeding with shutdown")
            }
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Drain the queue and signal cancellation to every running job
    async fn cancel_all(&self) {
        let queued: Vec<_> = self.queue_state.queue.lock().await.drain(..).collect();
        for id in &queued {
            if let Some(token) = self.queue_state.active_jobs.lock().await.get(id) {
                token.cancel();
            }
            self.finish_cancelled_in_queue(*id).await;
        }

        let active = self.queue_state.active_jobs.lock().await;
        tracing::debug!(
            queued = queued.len(),
            running = active.len(),
            "Cancelling all jobs"
        );
        for (id, token) in active.iter() {
            tracing::debug!(job_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.queue_state.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for running jobs to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
