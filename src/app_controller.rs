use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::JobError;
use crate::file_utils::{FileManager, FileType};
use crate::jobs::{ExclusionLists, JobService, JobStatus, ReconciliationRequest, TranslationRequest};
use crate::language_utils::Direction;

// @module: Application controller for workbook translation

/// How often the CLI polls a running job
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Workbooks of a folder run that are in flight at once
const FOLDER_CONCURRENCY: usize = 4;

/// Per-run switches; start from the config and let the CLI override them
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub direction: Direction,
    pub preserve_latin: bool,
    pub add_new_sheet: bool,
    pub exclusions: ExclusionLists,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            direction: config.direction,
            preserve_latin: config.preserve_latin,
            add_new_sheet: config.add_new_sheet,
            exclusions: ExclusionLists::default(),
        }
    }

    fn request_for(&self, input_file: &Path) -> TranslationRequest {
        TranslationRequest {
            input_path: input_file.to_path_buf(),
            original_filename: None,
            direction: self.direction,
            preserve_latin: self.preserve_latin,
            add_new_sheet: self.add_new_sheet,
            exclusions: self.exclusions.clone(),
        }
    }
}

/// Main application controller for workbook translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Job service all work goes through
    service: JobService,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let service = JobService::from_config(&config)?;
        Ok(Self { config, service })
    }

    /// Controller around an already built service
    pub fn with_service(config: Config, service: JobService) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &JobService {
        &self.service
    }

    /// Translate one workbook and write `{stem}_translated.xlsx` into `output_dir`.
    ///
    /// Returns the written path, or `None` when the output already exists and
    /// `force_overwrite` is off.
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        options: &RunOptions,
        force_overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &output_dir, options, &multi_progress, force_overwrite)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        options: &RunOptions,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        let start_time = std::time::Instant::now();

        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        if !matches!(
            FileManager::detect_file_type(input_file),
            FileType::Workbook | FileType::TranslatedOutput
        ) {
            return Err(anyhow!("Not an .xlsx workbook: {:?}", input_file));
        }

        FileManager::ensure_dir(output_dir)?;
        let output_path = FileManager::generate_output_path(input_file, output_dir);
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(None);
        }

        let job_id = self.service.submit_translation(options.request_for(input_file));
        let progress_bar = multi_progress.add(ProgressBar::new(100));
        progress_bar.set_style(Self::bar_style("%"));
        progress_bar.set_message("Queued");

        let result = self.follow_job(&job_id, &progress_bar).await;
        progress_bar.finish_and_clear();
        let result_path = result?;

        FileManager::copy_file(&result_path, &output_path)?;
        if let Err(e) = std::fs::remove_file(&result_path) {
            debug!("Failed to remove job result {:?}: {}", result_path, e);
        }

        info!(
            "Success: {} ({})",
            output_path.display(),
            Self::format_duration(start_time.elapsed())
        );
        Ok(Some(output_path))
    }

    /// Poll a job until it finishes, mirroring its progress on `progress_bar`
    async fn follow_job(&self, job_id: &str, progress_bar: &ProgressBar) -> Result<PathBuf> {
        loop {
            let snapshot = self.service.poll(job_id)?;
            progress_bar.set_position(u64::from(snapshot.progress));
            progress_bar.set_message(snapshot.message.clone());

            match snapshot.status {
                JobStatus::Completed => {
                    if let Some(summary) = &snapshot.summary {
                        debug!("Job summary: {:?}", summary);
                    }
                    return Ok(self.service.retrieve(job_id)?);
                }
                JobStatus::Failed => {
                    let message = snapshot.error.unwrap_or_default();
                    return Err(JobError::Failed {
                        id: job_id.to_string(),
                        message,
                    }
                    .into());
                }
                JobStatus::Pending | JobStatus::Running => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Translate every workbook under `input_dir`, writing outputs next to their inputs
    pub async fn run_folder(&self, input_dir: PathBuf, options: &RunOptions, force_overwrite: bool) -> Result<()> {
        let start_time = std::time::Instant::now();

        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let workbooks = FileManager::find_workbooks(&input_dir)?;
        if workbooks.is_empty() {
            return Err(anyhow!("No .xlsx workbooks found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(workbooks.len() as u64));
        folder_pb.set_style(Self::bar_style(" files"));
        folder_pb.set_message("Processing files");

        let outcomes = stream::iter(workbooks.iter())
            .map(|workbook| {
                let multi_progress = &multi_progress;
                let folder_pb = &folder_pb;
                let input_dir = &input_dir;
                async move {
                    let file_name = workbook
                        .file_name()
                        .map(|f| f.to_string_lossy().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    folder_pb.set_message(format!("Processing: {}", file_name));

                    let output_dir = workbook.parent().map_or_else(|| input_dir.clone(), Path::to_path_buf);
                    let outcome = self
                        .run_with_progress(workbook, &output_dir, options, multi_progress, force_overwrite)
                        .await;
                    folder_pb.inc(1);
                    (file_name, outcome)
                }
            })
            .buffer_unordered(FOLDER_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut success_count = 0;
        let mut error_count = 0;
        let mut skip_count = 0;
        for (file_name, outcome) in outcomes {
            match outcome {
                Ok(Some(_)) => success_count += 1,
                Ok(None) => skip_count += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    error_count += 1;
                }
            }
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed in {}: {} processed, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            success_count,
            skip_count,
            error_count
        );
        Ok(())
    }

    /// Extract the cells of `input_file` for out-of-process translation.
    ///
    /// Writes the instruction text to `prompt_path` and returns the token.
    pub async fn extract(
        &self,
        input_file: &Path,
        prompt_path: &Path,
        direction: Direction,
        exclusions: &ExclusionLists,
    ) -> Result<String> {
        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        let payload = self.service.extract(input_file, direction, exclusions).await?;
        if payload.is_empty() {
            warn!("No {} text found to extract", direction);
        }
        FileManager::write_to_file(prompt_path, &payload.prompt)?;
        info!(
            "Extracted {} cell(s) to {} (token {})",
            payload.len(),
            prompt_path.display(),
            payload.token
        );
        Ok(payload.token)
    }

    /// Apply a reply file to the workbook archived under `token`
    pub async fn reconcile(&self, token: &str, reply_file: &Path, output_path: &Path, force_overwrite: bool) -> Result<()> {
        if output_path.exists() && !force_overwrite {
            return Err(anyhow!(
                "Output already exists: {:?} (use -f to force overwrite)",
                output_path
            ));
        }
        let reply = FileManager::read_to_string(reply_file).context("Failed to read reply file")?;

        let job_id = self.service.submit_reconciliation(ReconciliationRequest {
            token: token.to_string(),
            reply,
        });
        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(Self::bar_style("%"));
        let result = self.follow_job(&job_id, &progress_bar).await;
        progress_bar.finish_and_clear();
        let result_path = result?;

        if let Some(parent) = output_path.parent() {
            FileManager::ensure_dir(parent)?;
        }
        FileManager::copy_file(&result_path, output_path)?;
        if let Err(e) = std::fs::remove_file(&result_path) {
            debug!("Failed to remove job result {:?}: {}", result_path, e);
        }
        if let Ok(snapshot) = self.service.poll(&job_id) {
            if let Some(summary) = snapshot.summary {
                info!(
                    "Applied {} translation(s), {} unparseable, {} without a cell",
                    summary.cells_translated, summary.discarded, summary.ignored
                );
            }
        }
        info!("Success: {}", output_path.display());
        Ok(())
    }

    fn bar_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}}{} {{msg}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
