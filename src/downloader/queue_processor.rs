//! Queue processing: hands queued jobs to the bounded worker pool.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::MediaDownloader;
use super::job_task::{JobTaskContext, run_job_task};

/// How long the processor sleeps when the queue is empty
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl MediaDownloader {
    /// Start the queue processor task
    ///
    /// The processor:
    /// 1. Takes the oldest queued job
    /// 2. Waits for a worker permit (max_concurrent_jobs)
    /// 3. Runs the job on its own task, releasing the permit when it finishes
    ///
    /// A job cancelled while waiting for a permit is failed without starting.
    /// Returns the processor's handle; abort it to stop processing.
    pub fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();

        tokio::spawn(async move {
            loop {
                let next = downloader.queue_state.queue.lock().await.pop_front();
                let Some(id) = next else {
                    tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                    continue;
                };

                let cancel_token = downloader
                    .queue_state
                    .active_jobs
                    .lock()
                    .await
                    .entry(id)
                    .or_insert_with(CancellationToken::new)
                    .clone();

                let permit = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => {
                        downloader.finish_cancelled_in_queue(id).await;
                        continue;
                    }
                    permit = downloader.queue_state.concurrent_limit.clone().acquire_owned() => {
                        match permit {
                            Ok(permit) => permit,
                            Err(_) => {
                                tracing::error!("worker pool closed, stopping queue processor");
                                downloader.queue_state.queue.lock().await.push_front(id);
                                break;
                            }
                        }
                    }
                };

                let ctx = JobTaskContext::new(&downloader, id, cancel_token);

                tokio::spawn(async move {
                    // Held until the job finishes
                    let _permit = permit;
                    run_job_task(ctx).await;
                });
            }
        })
    }
}
