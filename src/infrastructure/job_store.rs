//! In-memory, TTL-bounded scan job store.
//!
//! All mutations go through one `RwLock`-guarded map, which is the single
//! mutation point the concurrency contract requires: concurrent probe
//! updates for the same job merge field-by-field under the write lock and
//! can never lose each other's fields. Terminal entries expire after a
//! retention window, enforced lazily on read and physically by a background
//! sweep task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::entities::{AggregatedReport, ScanJob};
use crate::domain::value_objects::{ScanPhase, ScanStatus, ScanTransitionError};

/// Job store errors.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("scan not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] ScanTransitionError),
}

/// Partial-field update merged into an existing job entry.
#[derive(Debug, Clone, Default)]
pub struct ScanUpdate {
    pub phase: Option<ScanPhase>,
    pub progress_percent: Option<u8>,
}

impl ScanUpdate {
    pub fn phase(phase: ScanPhase) -> Self {
        Self {
            phase: Some(phase),
            ..Default::default()
        }
    }

    pub fn progress(percent: u8) -> Self {
        Self {
            progress_percent: Some(percent),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent);
        self
    }
}

/// Scan job storage interface.
#[async_trait]
pub trait ScanJobStore: Send + Sync {
    /// Initialize a Queued entry at 0% / `start` and return it.
    async fn create(&self, target_url: String, hostname: String) -> ScanJob;
    /// Transition Queued -> Running.
    async fn start(&self, id: Uuid) -> Result<(), JobStoreError>;
    /// Merge partial fields into the entry. Progress merges monotonically.
    async fn update(&self, id: Uuid, update: ScanUpdate) -> Result<(), JobStoreError>;
    /// Terminal: attach the report, set 100% / `done`.
    async fn complete(&self, id: Uuid, report: AggregatedReport) -> Result<(), JobStoreError>;
    /// Terminal: record a pipeline-level failure.
    async fn fail(&self, id: Uuid, message: String) -> Result<(), JobStoreError>;
    /// Terminal: target validation refused the job.
    async fn reject(&self, id: Uuid, message: String) -> Result<(), JobStoreError>;
    /// Fetch a snapshot; unknown and expired ids are indistinguishable.
    async fn get(&self, id: Uuid) -> Result<ScanJob, JobStoreError>;
    /// Number of non-terminal entries currently tracked.
    async fn active_count(&self) -> usize;
}

/// Process-local store; all state is lost on restart by design.
pub struct InMemoryScanJobStore {
    jobs: RwLock<HashMap<Uuid, ScanJob>>,
    retention: Duration,
}

impl InMemoryScanJobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Spawn the background eviction sweep. Stops when `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("job store sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.sweep().await;
                        if removed > 0 {
                            tracing::debug!(removed, "evicted expired scan jobs");
                        }
                    }
                }
            }
        });
    }

    /// Remove terminal entries past the retention window; returns the count.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let retention = self.retention;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !Self::is_expired(job, now, retention));
        before - jobs.len()
    }

    fn is_expired(job: &ScanJob, now: DateTime<Utc>, retention: Duration) -> bool {
        if !job.status.is_terminal() {
            return false;
        }
        let terminal_at = job.completed_at.unwrap_or(job.last_updated_at);
        match (now - terminal_at).to_std() {
            Ok(elapsed) => elapsed > retention,
            Err(_) => false,
        }
    }

    async fn finalize<F>(&self, id: Uuid, status: ScanStatus, apply: F) -> Result<(), JobStoreError>
    where
        F: FnOnce(&mut ScanJob),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.transition(status)?;
        job.completed_at = Some(Utc::now());
        apply(job);
        Ok(())
    }
}

#[async_trait]
impl ScanJobStore for InMemoryScanJobStore {
    async fn create(&self, target_url: String, hostname: String) -> ScanJob {
        let job = ScanJob::new(target_url, hostname);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.scan_id, job.clone());
        job
    }

    async fn start(&self, id: Uuid) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.transition(ScanStatus::Running)?;
        Ok(())
    }

    async fn update(&self, id: Uuid, update: ScanUpdate) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if let Some(phase) = update.phase {
            job.phase = phase;
        }
        if let Some(percent) = update.progress_percent {
            // Monotonic regardless of the order concurrent callers land in.
            job.progress_percent = job.progress_percent.max(percent.min(100));
        }
        job.last_updated_at = Utc::now();
        Ok(())
    }

    async fn complete(&self, id: Uuid, report: AggregatedReport) -> Result<(), JobStoreError> {
        self.finalize(id, ScanStatus::Completed, |job| {
            job.progress_percent = 100;
            job.phase = ScanPhase::Done;
            job.report = Some(report);
        })
        .await
    }

    async fn fail(&self, id: Uuid, message: String) -> Result<(), JobStoreError> {
        self.finalize(id, ScanStatus::Failed, |job| {
            job.error = Some(message);
        })
        .await
    }

    async fn reject(&self, id: Uuid, message: String) -> Result<(), JobStoreError> {
        self.finalize(id, ScanStatus::Rejected, |job| {
            job.error = Some(message);
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<ScanJob, JobStoreError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(JobStoreError::NotFound(id))?;
        if Self::is_expired(job, Utc::now(), self.retention) {
            // Invisible once expired; the sweeper removes it physically.
            return Err(JobStoreError::NotFound(id));
        }
        Ok(job.clone())
    }

    async fn active_count(&self) -> usize {
        let jobs = self.jobs.read().await;
        jobs.values().filter(|j| !j.status.is_terminal()).count()
    }
}
