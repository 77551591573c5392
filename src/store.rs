//! Job store: the single source of truth for job state
//!
//! The store is a map from [`JobId`] to a per-job `watch` cell. The map lock is
//! held only to insert or look up a cell; every mutation is serialized by the
//! job's own cell, so progress on one job never contends with reads of another.
//!
//! The store enforces the lifecycle rules: status never moves backward,
//! progress never drops while downloading or processing, and terminal jobs are
//! immutable. A mutation that breaks a rule is rejected as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};

use crate::compiler::RequestConfig;
use crate::error::{Error, Result};
use crate::types::{JobId, JobResult, JobSnapshot, Status};

/// Full internal state of one job
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    /// Job identifier (immutable)
    pub id: JobId,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f64,
    /// Bytes transferred for the current item
    pub downloaded_bytes: Option<u64>,
    /// Total bytes for the current item, if known
    pub total_bytes: Option<u64>,
    /// Speed in bytes per second
    pub speed: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<u64>,
    /// Requested URL (immutable)
    pub url: String,
    /// Compiled configuration (immutable)
    pub request_config: Arc<RequestConfig>,
    /// Terminal result
    pub result: Option<JobResult>,
    /// File the engine is currently writing
    pub current_file: Option<String>,
    /// Number of `finished` transfer events, one per downloaded stream
    pub items_finished: u32,
    /// Non-fatal warnings
    pub warnings: Vec<String>,
    /// Creation time (immutable)
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(id: JobId, url: String, request_config: Arc<RequestConfig>) -> Self {
        Self {
            id,
            status: Status::Queued,
            progress: 0.0,
            downloaded_bytes: None,
            total_bytes: None,
            speed: None,
            eta: None,
            url,
            request_config,
            result: None,
            current_file: None,
            items_finished: 0,
            warnings: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Milliseconds between creation and pickup (or now, if still waiting)
    fn queued_ms(&self, now: DateTime<Utc>) -> u64 {
        let until = self.started_at.or(self.finished_at).unwrap_or(now);
        u64::try_from((until - self.created_at).num_milliseconds()).unwrap_or(0)
    }

    /// Read-safe copy of the externally visible fields
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            url: self.url.clone(),
            result: self.result.clone(),
            speed: self.speed,
            eta: self.eta,
            downloaded_bytes: self.downloaded_bytes,
            total_bytes: self.total_bytes,
            current_file: self.current_file.clone(),
            items_finished: self.items_finished,
            queued_ms: self.queued_ms(Utc::now()),
            warnings: self.warnings.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Outcome of [`JobStore::update`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mutation was applied
    Applied,
    /// The mutation changed nothing
    Unchanged,
    /// The mutation broke a lifecycle rule and was discarded
    Rejected(&'static str),
}

impl UpdateOutcome {
    /// Whether the job's state changed
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Concurrent map of per-job state cells
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Arc<watch::Sender<Job>>>>>,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queued job and return its id
    pub async fn create(&self, url: impl Into<String>, config: Arc<RequestConfig>) -> JobId {
        let url = url.into();
        let mut jobs = self.jobs.write().await;

        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }

        let (cell, _) = watch::channel(Job::new(id, url, config));
        jobs.insert(id, Arc::new(cell));
        id
    }

    async fn cell(&self, id: JobId) -> Result<Arc<watch::Sender<Job>>> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("job {id}")))
    }

    /// Apply an atomic, serialized mutation to one job
    ///
    /// The mutator runs against a copy; the copy replaces the stored state only
    /// if it respects the lifecycle rules. Returns [`Error::NotFound`] for an
    /// unknown id.
    pub async fn update<F>(&self, id: JobId, mutator: F) -> Result<UpdateOutcome>
    where
        F: FnOnce(&mut Job),
    {
        let cell = self.cell(id).await?;
        let mut outcome = UpdateOutcome::Unchanged;

        cell.send_if_modified(|job| {
            let mut next = job.clone();
            mutator(&mut next);

            if let Err(reason) = check_transition(job, &next) {
                outcome = UpdateOutcome::Rejected(reason);
                return false;
            }

            if next.status.is_terminal() && next.finished_at.is_none() {
                next.finished_at = Some(Utc::now());
            }

            if *job == next {
                return false;
            }

            *job = next;
            outcome = UpdateOutcome::Applied;
            true
        });

        if let UpdateOutcome::Rejected(reason) = &outcome {
            tracing::debug!(job_id = %id, reason, "rejected job state update");
        }

        Ok(outcome)
    }

    /// Owned copy of a job's visible state
    pub async fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        let cell = self.cell(id).await.ok()?;
        let snapshot = cell.borrow().snapshot();
        Some(snapshot)
    }

    /// Compiled configuration of a job
    pub async fn request_config(&self, id: JobId) -> Option<Arc<RequestConfig>> {
        let cell = self.cell(id).await.ok()?;
        let config = cell.borrow().request_config.clone();
        Some(config)
    }

    /// Receiver that observes every committed state of a job
    pub async fn watch(&self, id: JobId) -> Option<watch::Receiver<Job>> {
        let cell = self.cell(id).await.ok()?;
        Some(cell.subscribe())
    }

    /// Snapshots of all jobs, oldest first
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let cells: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut snapshots: Vec<JobSnapshot> =
            cells.iter().map(|cell| cell.borrow().snapshot()).collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }
}

fn check_transition(prev: &Job, next: &Job) -> std::result::Result<(), &'static str> {
    if prev.status.is_terminal() {
        return Err("job is terminal");
    }
    if next.id != prev.id
        || next.url != prev.url
        || next.created_at != prev.created_at
        || !Arc::ptr_eq(&next.request_config, &prev.request_config)
    {
        return Err("immutable field changed");
    }
    if next.status.rank() < prev.status.rank() {
        return Err("status would regress");
    }
    if !(0.0..=100.0).contains(&next.progress) {
        return Err("progress out of range");
    }
    if next.status.rank() < Status::Downloading.rank() && next.progress != 0.0 {
        return Err("progress before downloading must be zero");
    }
    let in_transfer = |s: Status| matches!(s, Status::Downloading | Status::Processing);
    if in_transfer(prev.status) && in_transfer(next.status) && next.progress < prev.progress {
        return Err("progress would decrease");
    }
    if next.status.is_terminal() && next.result.is_none() {
        return Err("terminal status without result");
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileContext, DownloadRequest, compile};
    use crate::types::{ErrorKind, JobError, ResultSummary};
    use std::collections::HashSet;

    fn config() -> Arc<RequestConfig> {
        let request = DownloadRequest::new("https://example.com/v");
        Arc::new(compile(&request, &CompileContext::default()).unwrap())
    }

    fn completed() -> JobResult {
        JobResult::Completed {
            downloads: vec![],
            skipped: vec![],
            summary: ResultSummary::default(),
        }
    }

    #[tokio::test]
    async fn create_returns_queued_snapshot() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;

        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.job_id, id);
        assert_eq!(snap.status, Status::Queued);
        assert_eq!(snap.progress, 0.0);
        assert!(snap.result.is_none());
    }

    #[tokio::test]
    async fn parallel_creates_yield_unique_ids() {
        let store = JobStore::new();
        let cfg = config();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                let cfg = cfg.clone();
                tokio::spawn(async move { store.create("https://example.com/v", cfg).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()), "duplicate job id");
        }
        assert_eq!(store.list().await.len(), 64);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = JobStore::new();
        let err = store.update(JobId::new(), |_| {}).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.snapshot(JobId::new()).await.is_none());
    }

    #[tokio::test]
    async fn forward_path_is_accepted() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;

        for status in [Status::Starting, Status::Downloading, Status::Processing] {
            let outcome = store.update(id, |job| job.status = status).await.unwrap();
            assert_eq!(outcome, UpdateOutcome::Applied, "{status} must be accepted");
        }
        store
            .update(id, |job| {
                job.progress = 100.0;
            })
            .await
            .unwrap();
        store
            .update(id, |job| {
                job.status = Status::Completed;
                job.result = Some(completed());
            })
            .await
            .unwrap();

        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.status, Status::Completed);
        assert!(snap.finished_at.is_some(), "store stamps finish time");
    }

    #[tokio::test]
    async fn regression_is_rejected_and_state_kept() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;
        store
            .update(id, |job| job.status = Status::Processing)
            .await
            .unwrap();

        let outcome = store
            .update(id, |job| job.status = Status::Downloading)
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));
        assert_eq!(
            store.snapshot(id).await.unwrap().status,
            Status::Processing
        );
    }

    #[tokio::test]
    async fn progress_cannot_drop_while_downloading() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;
        store
            .update(id, |job| {
                job.status = Status::Downloading;
                job.progress = 40.0;
            })
            .await
            .unwrap();

        let outcome = store
            .update(id, |job| {
                job.progress = 10.0;
                job.speed = Some(1.0);
            })
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));
        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.progress, 40.0);
        assert_eq!(snap.speed, None, "rejected mutation is discarded whole");
    }

    #[tokio::test]
    async fn terminal_job_is_immutable() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;
        store
            .update(id, |job| {
                job.status = Status::Error;
                job.result = Some(JobResult::failure(JobError::new(
                    ErrorKind::Cancelled,
                    "cancelled",
                )));
            })
            .await
            .unwrap();

        let outcome = store
            .update(id, |job| job.warnings.push("late".into()))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Rejected("job is terminal"));
        assert!(store.snapshot(id).await.unwrap().warnings.is_empty());
    }

    #[tokio::test]
    async fn terminal_status_requires_result() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;

        let outcome = store
            .update(id, |job| job.status = Status::Error)
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn queued_progress_must_stay_zero() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;

        let outcome = store.update(id, |job| job.progress = 5.0).await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn no_op_mutation_is_unchanged() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;

        let outcome = store.update(id, |_| {}).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Unchanged);
    }

    #[tokio::test]
    async fn watchers_see_committed_state() {
        let store = JobStore::new();
        let id = store.create("https://example.com/v", config()).await;
        let mut rx = store.watch(id).await.unwrap();

        store
            .update(id, |job| job.status = Status::Starting)
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, Status::Starting);
    }

    #[tokio::test]
    async fn request_config_is_retrievable() {
        let store = JobStore::new();
        let cfg = config();
        let id = store.create("https://example.com/v", cfg.clone()).await;

        let stored = store.request_config(id).await.unwrap();
        assert!(Arc::ptr_eq(&stored, &cfg));
    }
}
