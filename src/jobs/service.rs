/*!
 * Job service: the operations a client sees.
 *
 * Submissions return a job id immediately and run on a tokio task. Clients
 * poll with the id, retrieve the result once completed, and a background
 * reaper drops jobs whose retention ran out along with stale extraction
 * archives.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::models::{
    ExclusionLists, HealthReport, JobId, JobKind, JobSnapshot, JobSummary, ReconciliationRequest, TranslationRequest,
    short_id,
};
use super::progress::JobProgress;
use super::registry::JobRegistry;
use super::worker::{run_reconciliation, run_translation};
use crate::app_config::Config;
use crate::document::Workbook;
use crate::errors::JobError;
use crate::extraction::{ExtractionArchive, ExtractionPayload};
use crate::language_utils::Direction;
use crate::translation::{CellWalker, TranslationDictionary, TranslationResolver};

/// How long an unreconciled extraction archive is kept by default
pub const DEFAULT_ARCHIVE_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Entry point for submitting and following jobs
#[derive(Clone)]
pub struct JobService {
    registry: JobRegistry,
    resolver: TranslationResolver,
    work_dir: PathBuf,
    archive: ExtractionArchive,
    archive_retention: Duration,
}

impl JobService {
    /// Results go to `work_dir`, extraction archives to `work_dir/archive`
    pub fn new(resolver: TranslationResolver, work_dir: impl Into<PathBuf>, retention: Duration) -> Self {
        let work_dir = work_dir.into();
        Self {
            registry: JobRegistry::new(retention),
            resolver,
            archive: ExtractionArchive::new(work_dir.join("archive")),
            work_dir,
            archive_retention: DEFAULT_ARCHIVE_RETENTION,
        }
    }

    /// Keep extraction archives for `retention` before the reaper sweeps them
    pub fn with_archive_retention(mut self, retention: Duration) -> Self {
        self.archive_retention = retention;
        self
    }

    /// Load the term table and backend chain described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let dictionary = TranslationDictionary::load_from_files(
            config.dictionary.path.as_deref(),
            Some(config.custom_dictionary_path().as_path()),
        )?;
        let resolver = TranslationResolver::from_config(Arc::new(dictionary), &config.translation);
        debug!("Backend chain: {:?}", resolver.backend_names());
        Ok(Self::new(
            resolver,
            config.work_dir.clone(),
            Duration::from_secs(config.result_retention_secs),
        )
        .with_archive_retention(Duration::from_secs(config.archive_retention_secs)))
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &TranslationResolver {
        &self.resolver
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn archive(&self) -> &ExtractionArchive {
        &self.archive
    }

    /// Queue a translation job. Must be called from within a tokio runtime.
    pub fn submit_translation(&self, request: TranslationRequest) -> JobId {
        let id = self.registry.create(JobKind::Translate);
        info!(
            "Job {}: translating {} ({})",
            short_id(&id),
            request.display_filename(),
            request.direction
        );

        let registry = self.registry.clone();
        let resolver = self.resolver.clone();
        let work_dir = self.work_dir.clone();
        let progress = JobProgress::new(registry.clone(), id.clone());
        let job_id = id.clone();
        spawn_job(registry, id.clone(), async move {
            run_translation(&resolver, &work_dir, &job_id, &request, &progress).await
        });
        id
    }

    /// Queue a reconciliation job for a previously extracted workbook
    pub fn submit_reconciliation(&self, request: ReconciliationRequest) -> JobId {
        let id = self.registry.create(JobKind::Reconcile);
        info!("Job {}: reconciling token {}", short_id(&id), request.token);

        let registry = self.registry.clone();
        let archive = self.archive.clone();
        let work_dir = self.work_dir.clone();
        let progress = JobProgress::new(registry.clone(), id.clone());
        let job_id = id.clone();
        spawn_job(registry, id.clone(), async move {
            run_reconciliation(&archive, &work_dir, &job_id, &request, &progress).await
        });
        id
    }

    /// Collect the cells that need translation and archive the workbook.
    ///
    /// The returned payload carries the token to reconcile against later.
    pub async fn extract(
        &self,
        path: &Path,
        direction: Direction,
        exclusions: &ExclusionLists,
    ) -> Result<ExtractionPayload> {
        let path = path.to_path_buf();
        let archive = self.archive.clone();
        let rules = exclusions.to_rules();

        tokio::task::spawn_blocking(move || -> Result<ExtractionPayload> {
            let workbook = Workbook::open(&path).with_context(|| format!("Failed to open workbook {:?}", path))?;
            let walker = CellWalker::new(rules);
            let cells = ExtractionPayload::collect(&workbook, &walker, direction);

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "workbook.xlsx".to_string());
            let manifest = archive.store(&path, &filename, direction)?;
            info!("Extracted {} cell(s) from {} as {}", cells.len(), filename, manifest.token);
            Ok(ExtractionPayload::new(manifest.token, direction, cells))
        })
        .await
        .context("Extraction task panicked")?
    }

    /// Current state of a job
    pub fn poll(&self, id: &str) -> Result<JobSnapshot, JobError> {
        self.registry.snapshot(id)
    }

    /// Path of a completed job's result
    pub fn retrieve(&self, id: &str) -> Result<PathBuf, JobError> {
        self.registry.retrieve(id)
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait_for(&self, id: &str, interval: Duration) -> Result<JobSnapshot, JobError> {
        loop {
            let snapshot = self.poll(id)?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            active_jobs: self.registry.active_count(),
            tracked_jobs: self.registry.len(),
        }
    }

    /// Sweep expired jobs and stale extraction archives every `interval`
    /// until the handle is aborted
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let archive = self.archive.clone();
        let archive_retention = self.archive_retention;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = registry.sweep_expired(Instant::now());
                if !removed.is_empty() {
                    debug!("Reaper removed {} expired job(s)", removed.len());
                }

                let sweeper = archive.clone();
                match tokio::task::spawn_blocking(move || sweeper.sweep_expired(archive_retention)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Archive sweep failed: {:#}", e),
                    Err(e) => warn!("Archive sweep task failed: {}", e),
                }
            }
        })
    }
}

/// Run `work` as job `id` on its own task.
///
/// The work is spawned separately so that a panic inside it surfaces as a
/// join error here and fails the job instead of leaving it running.
fn spawn_job<F>(registry: JobRegistry, id: JobId, work: F)
where
    F: Future<Output = Result<(PathBuf, JobSummary)>> + Send + 'static,
{
    tokio::spawn(async move {
        if !start(&registry, &id) {
            return;
        }
        let result = match tokio::spawn(work).await {
            Ok(result) => result,
            Err(e) => {
                error!("Job {} worker task failed: {}", short_id(&id), e);
                Err(anyhow!("Worker task failed: {}", e))
            }
        };
        finish(&registry, &id, result);
    });
}

fn start(registry: &JobRegistry, id: &str) -> bool {
    match registry.mark_running(id) {
        Ok(()) => true,
        Err(e) => {
            error!("Job {} could not start: {}", short_id(id), e);
            false
        }
    }
}

fn finish(registry: &JobRegistry, id: &str, result: Result<(PathBuf, JobSummary)>) {
    let recorded = match result {
        Ok((path, summary)) => registry.complete(id, path, summary),
        Err(e) => registry.fail(id, format!("{:#}", e)),
    };
    if let Err(e) = recorded {
        error!("Job {} result was not recorded: {}", short_id(id), e);
    }
}
