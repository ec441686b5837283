/*!
 * In-memory job registry.
 *
 * This module handles:
 * - Creating jobs and enforcing the pending -> running -> terminal state machine
 * - Monotonic progress updates from workers
 * - Consistent snapshots for polling clients
 * - Retention of finished jobs and cleanup of their result files
 */

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::models::{Job, JobId, JobKind, JobSnapshot, JobStatus, JobSummary, short_id};
use crate::errors::JobError;

/// Highest progress a job can show before it completes
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Shared job table; clones refer to the same jobs
#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    retention: Duration,
}

impl JobRegistry {
    /// Create a registry keeping finished jobs for `retention` after they are observed
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Register a new pending job and return its id
    pub fn create(&self, kind: JobKind) -> JobId {
        let id = Uuid::new_v4().to_string();
        self.jobs.write().insert(id.clone(), Job::new(id.clone(), kind));
        debug!("Created {:?} job {}", kind, short_id(&id));
        id
    }

    /// Move a pending job to running
    pub fn mark_running(&self, id: &str) -> Result<(), JobError> {
        self.transition(id, JobStatus::Running, |job| {
            job.message = "Started".to_string();
        })
    }

    /// Raise the progress of a running job.
    ///
    /// `percent` is floored to a whole number. Values below the current
    /// progress are ignored and everything is capped at
    /// [`MAX_RUNNING_PROGRESS`]; only completion shows 100.
    pub fn update_progress(&self, id: &str, percent: f64, message: &str) -> Result<(), JobError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Running {
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                from: job.status.to_string(),
                to: "progress".to_string(),
            });
        }
        if percent.is_finite() {
            let whole = percent.clamp(0.0, f64::from(MAX_RUNNING_PROGRESS)).floor() as u8;
            job.progress = job.progress.max(whole);
        }
        if !message.is_empty() {
            job.message = message.to_string();
        }
        Ok(())
    }

    /// Finish a running job with its result file
    pub fn complete(&self, id: &str, result_path: PathBuf, summary: JobSummary) -> Result<(), JobError> {
        self.transition(id, JobStatus::Completed, |job| {
            job.progress = 100;
            job.message = "Completed".to_string();
            job.result_path = Some(result_path);
            job.summary = Some(summary);
        })?;
        info!("Job {} completed", short_id(id));
        Ok(())
    }

    /// Fail a job, keeping its last progress value
    pub fn fail(&self, id: &str, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, |job| {
            job.message = "Failed".to_string();
            job.error = Some(error.clone());
        })?;
        warn!("Job {} failed: {}", short_id(id), error);
        Ok(())
    }

    fn transition<F>(&self, id: &str, to: JobStatus, apply: F) -> Result<(), JobError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let allowed = match (job.status, to) {
            (JobStatus::Pending, JobStatus::Running) => true,
            // a job can fail before its worker gets going
            (JobStatus::Pending | JobStatus::Running, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Completed) => true,
            _ => false,
        };
        if !allowed {
            warn!("Rejected transition for job {}: {} -> {}", job.short_id(), job.status, to);
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                from: job.status.to_string(),
                to: to.to_string(),
            });
        }
        job.status = to;
        apply(job);
        Ok(())
    }

    /// Consistent copy of a job's public state.
    ///
    /// Observing a failed job starts its retention countdown.
    pub fn snapshot(&self, id: &str) -> Result<JobSnapshot, JobError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status == JobStatus::Failed && job.expires_at.is_none() {
            job.expires_at = Some(Instant::now() + self.retention);
        }
        Ok(JobSnapshot::from(&*job))
    }

    /// Hand out the result path of a completed job and start its retention countdown
    pub fn retrieve(&self, id: &str) -> Result<PathBuf, JobError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        match (job.status, &job.result_path) {
            (JobStatus::Completed, Some(path)) => {
                if job.expires_at.is_none() {
                    job.expires_at = Some(Instant::now() + self.retention);
                }
                Ok(path.clone())
            }
            (JobStatus::Failed, _) => {
                if job.expires_at.is_none() {
                    job.expires_at = Some(Instant::now() + self.retention);
                }
                Err(JobError::Failed {
                    id: id.to_string(),
                    message: job.error.clone().unwrap_or_default(),
                })
            }
            _ => Err(JobError::NotReady(id.to_string())),
        }
    }

    /// Drop jobs whose retention ran out by `now` and delete their result files.
    /// Returns the removed ids.
    pub fn sweep_expired(&self, now: Instant) -> Vec<JobId> {
        let expired: Vec<Job> = {
            let mut jobs = self.jobs.write();
            let ids: Vec<JobId> = jobs
                .values()
                .filter(|job| job.expires_at.is_some_and(|at| at <= now))
                .map(|job| job.id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &expired {
            if let Some(path) = &job.result_path {
                match std::fs::remove_file(path) {
                    Ok(()) => debug!("Removed result of job {}: {:?}", job.short_id(), path),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove {:?}: {}", path, e),
                }
            }
        }
        expired.into_iter().map(|job| job.id).collect()
    }

    /// Jobs not yet in a terminal state
    pub fn active_count(&self) -> usize {
        self.jobs.read().values().filter(|job| !job.status.is_terminal()).count()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
