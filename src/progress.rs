//! Progress translation
//!
//! Engines report progress as loosely-typed JSON payloads sent over a per-job
//! channel. A [`ProgressTranslator`] task drains that channel and folds each
//! payload into the job's state cell with one atomic update.
//!
//! Payload shape (keys other than `status` are optional):
//!
//! ```json
//! {"status": "downloading", "downloaded_bytes": 1024, "total_bytes": 4096,
//!  "total_bytes_estimate": 4000, "speed": 512.0, "eta": 6, "filename": "clip.mp4"}
//! ```

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::classify::classify;
use crate::error::Result;
use crate::store::{JobStore, UpdateOutcome};
use crate::types::{Event, JobId, JobResult, Status};

/// Sending half handed to the fetch engine
pub type ProgressSender = mpsc::Sender<Value>;

/// Receiving half drained by the translator
pub type ProgressReceiver = mpsc::Receiver<Value>;

/// Progress shown while the total is unknown never reaches this value
const UNKNOWN_TOTAL_CAP: f64 = 99.0;

/// Folds engine progress payloads into one job's state
#[derive(Clone)]
pub struct ProgressTranslator {
    store: JobStore,
    id: JobId,
    unknown_total_divisor: u64,
    event_tx: broadcast::Sender<Event>,
}

impl ProgressTranslator {
    /// Create a translator for one job
    pub fn new(
        store: JobStore,
        id: JobId,
        unknown_total_divisor: u64,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            store,
            id,
            unknown_total_divisor: unknown_total_divisor.max(1),
            event_tx,
        }
    }

    /// Run until every sender is dropped and the channel is drained
    pub fn spawn(self, mut rx: ProgressReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(e) = self.apply(&payload).await {
                    tracing::warn!(job_id = %self.id, error = %e, "failed to apply progress event");
                }
            }
        })
    }

    /// Apply one payload to the job
    pub async fn apply(&self, payload: &Value) -> Result<UpdateOutcome> {
        match payload.get("status").and_then(Value::as_str) {
            Some("downloading") => self.on_downloading(payload).await,
            Some("finished") => self.on_finished(payload).await,
            Some("error") => self.on_error(payload).await,
            other => {
                tracing::debug!(job_id = %self.id, status = ?other, "ignoring progress event");
                Ok(UpdateOutcome::Unchanged)
            }
        }
    }

    async fn on_downloading(&self, payload: &Value) -> Result<UpdateOutcome> {
        let downloaded = bytes(payload, "downloaded_bytes").unwrap_or(0);
        let total = known_total(payload);
        let progress = compute_progress(downloaded, total, self.unknown_total_divisor);
        let speed = number(payload, "speed").unwrap_or(0.0);
        let eta = bytes(payload, "eta").unwrap_or(0);
        let filename = payload
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut reported = None;
        let outcome = self
            .store
            .update(self.id, |job| {
                job.speed = Some(speed);
                job.eta = Some(eta);
                if filename.is_some() {
                    job.current_file = filename;
                }
                if job.status == Status::Processing {
                    return;
                }
                job.status = Status::Downloading;
                job.progress = job.progress.max(progress);
                job.downloaded_bytes = Some(downloaded);
                job.total_bytes = total;
                reported = Some(job.progress);
            })
            .await?;

        if let (true, Some(progress)) = (outcome.is_applied(), reported) {
            self.event_tx
                .send(Event::Downloading {
                    id: self.id,
                    progress,
                    speed: Some(speed),
                })
                .ok();
        }
        Ok(outcome)
    }

    async fn on_finished(&self, payload: &Value) -> Result<UpdateOutcome> {
        let total = known_total(payload);

        let mut entered_processing = false;
        let outcome = self
            .store
            .update(self.id, |job| {
                entered_processing = job.status != Status::Processing;
                job.status = Status::Processing;
                job.progress = 100.0;
                if let Some(total) = total.or(job.total_bytes) {
                    job.total_bytes = Some(total);
                    job.downloaded_bytes = Some(total);
                }
                // once per stream: merged formats finish twice
                job.items_finished += 1;
            })
            .await?;

        if outcome.is_applied() && entered_processing {
            self.event_tx.send(Event::Processing { id: self.id }).ok();
        }
        Ok(outcome)
    }

    async fn on_error(&self, payload: &Value) -> Result<UpdateOutcome> {
        let raw = ["error", "message", "detail"]
            .iter()
            .find_map(|key| payload.get(key).and_then(Value::as_str))
            .unwrap_or("engine reported an error")
            .to_string();
        let error = classify(&raw);

        let outcome = self
            .store
            .update(self.id, |job| {
                job.status = Status::Error;
                job.result = Some(JobResult::failure(error.clone()));
            })
            .await?;

        if outcome.is_applied() {
            tracing::error!(job_id = %self.id, error_kind = error.error_kind.code(), detail = %raw, "engine reported failure");
            self.event_tx
                .send(Event::Failed {
                    id: self.id,
                    error,
                })
                .ok();
        }
        Ok(outcome)
    }
}

/// Percentage for a transfer
///
/// With a known positive total this is `downloaded / total * 100` clamped to
/// [0, 100]. Without one it is `downloaded / divisor` capped at 99. Both are
/// rounded to two decimals.
pub fn compute_progress(downloaded: u64, total: Option<u64>, divisor: u64) -> f64 {
    let raw = match total {
        Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0),
        _ => (downloaded as f64 / divisor.max(1) as f64).min(UNKNOWN_TOTAL_CAP),
    };
    (raw * 100.0).round() / 100.0
}

fn number(payload: &Value, key: &str) -> Option<f64> {
    payload
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
}

fn bytes(payload: &Value, key: &str) -> Option<u64> {
    number(payload, key).map(|n| n as u64)
}

fn known_total(payload: &Value) -> Option<u64> {
    bytes(payload, "total_bytes")
        .filter(|&t| t > 0)
        .or_else(|| bytes(payload, "total_bytes_estimate").filter(|&t| t > 0))
}
