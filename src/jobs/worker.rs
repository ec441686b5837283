/*!
 * Job workers.
 *
 * `translate_workbook` and `apply_reply` operate on an opened workbook and
 * are free of file I/O. The `run_*` functions wrap them with loading, the
 * progress bands and the `.part`-then-rename save.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::models::{JobSummary, ReconciliationRequest, TranslationRequest, short_id};
use super::progress::{LOAD_DONE, ProgressPlan, ProgressSink, SAVING, SHEETS_DONE};
use crate::document::Workbook;
use crate::errors::DocumentError;
use crate::extraction::{ExtractionArchive, ReconciliationOutcome, reconcile};
use crate::file_utils::FileManager;
use crate::language_utils::Direction;
use crate::translation::{
    CellWalker, ReinjectionReport, ResolutionMethod, TranslationResolver, apply_translations,
};

/// Per-job translation switches
#[derive(Debug, Clone, Copy)]
pub struct TranslationOptions {
    pub direction: Direction,
    pub preserve_latin: bool,
    /// Translate into a copy of each sheet instead of in place
    pub add_new_sheet: bool,
}

impl From<&TranslationRequest> for TranslationOptions {
    fn from(request: &TranslationRequest) -> Self {
        Self {
            direction: request.direction,
            preserve_latin: request.preserve_latin,
            add_new_sheet: request.add_new_sheet,
        }
    }
}

/// Translate every visitable cell of `workbook`, reporting within the sheet band.
///
/// In new-sheet mode every non-excluded sheet is copied first and only the
/// copies are written to. Cells whose resolved text equals the original are
/// left untouched.
pub async fn translate_workbook(
    workbook: &mut Workbook,
    resolver: &TranslationResolver,
    walker: &CellWalker,
    options: TranslationOptions,
    sink: &dyn ProgressSink,
) -> Result<JobSummary, DocumentError> {
    let mut targets = workbook.sheet_names();
    if options.add_new_sheet {
        let mut copies = Vec::with_capacity(targets.len());
        for name in targets.iter().filter(|name| !walker.rules().excludes_sheet(name)) {
            let requested = format!("{}{}", name, options.direction.sheet_suffix());
            copies.push(workbook.duplicate_sheet(name, &requested)?);
        }
        targets = copies;
    }

    let plan = ProgressPlan::new(targets.len());
    let mut summary = JobSummary::default();

    for (index, name) in targets.iter().enumerate() {
        let cells = workbook.sheet(name).and_then(|sheet| walker.sheet_cells(sheet));
        let Some(cells) = cells else {
            sink.report(plan.sheet_progress(index, 0, 0), &format!("Skipped sheet '{}'", name));
            continue;
        };

        let total = cells.len();
        debug!("Sheet '{}': {} candidate cell(s)", name, total);
        for (done, (address, text)) in cells.into_iter().enumerate() {
            let resolution = resolver
                .resolve_detailed(&text, options.direction, options.preserve_latin)
                .await;
            summary.cells_visited += 1;
            match resolution.method {
                ResolutionMethod::Dictionary => summary.dictionary_hits += 1,
                ResolutionMethod::Backend(_) => summary.backend_hits += 1,
                _ => {}
            }
            if resolution.text != text && workbook.set_text(&address, &resolution.text) {
                summary.cells_translated += 1;
            }
            sink.report(
                plan.sheet_progress(index, done + 1, total),
                &format!("Sheet '{}': {}/{} cells", name, done + 1, total),
            );
        }
    }

    Ok(summary)
}

/// Parse `reply` and write its translations into `workbook`
pub fn apply_reply(workbook: &mut Workbook, reply: &str) -> (ReconciliationOutcome, ReinjectionReport) {
    let outcome = reconcile(reply);
    let report = apply_translations(workbook, &outcome.translations);
    (outcome, report)
}

/// Output location for a job: `{job_id}_translated_{filename}`
pub fn output_path(work_dir: &Path, job_id: &str, filename: &str) -> PathBuf {
    work_dir.join(format!("{}_translated_{}", job_id, FileManager::sanitize_filename(filename)))
}

/// Load, translate and save one workbook
pub async fn run_translation(
    resolver: &TranslationResolver,
    work_dir: &Path,
    job_id: &str,
    request: &TranslationRequest,
    sink: &dyn ProgressSink,
) -> Result<(PathBuf, JobSummary)> {
    sink.report(0.0, "Loading workbook");
    let mut workbook = open_workbook(request.input_path.clone()).await?;
    sink.report(LOAD_DONE, "Workbook loaded");

    let walker = CellWalker::new(request.exclusions.to_rules());
    let summary = translate_workbook(&mut workbook, resolver, &walker, TranslationOptions::from(request), sink)
        .await
        .context("Failed to translate workbook")?;

    sink.report(SAVING, "Saving");
    let output = output_path(work_dir, job_id, &request.display_filename());
    save_workbook(workbook, output.clone()).await?;
    info!(
        "Job {}: translated {} of {} cell(s)",
        short_id(job_id),
        summary.cells_translated,
        summary.cells_visited
    );
    Ok((output, summary))
}

/// Apply a reply to the archived workbook of `request.token` and save the result
pub async fn run_reconciliation(
    archive: &ExtractionArchive,
    work_dir: &Path,
    job_id: &str,
    request: &ReconciliationRequest,
    sink: &dyn ProgressSink,
) -> Result<(PathBuf, JobSummary)> {
    sink.report(0.0, "Verifying archive");
    let opener = archive.clone();
    let token = request.token.clone();
    let (manifest, archived) = tokio::task::spawn_blocking(move || opener.open(&token))
        .await
        .context("Archive task panicked")??;
    let mut workbook = open_workbook(archived).await?;
    sink.report(LOAD_DONE, "Workbook loaded");

    let (outcome, report) = apply_reply(&mut workbook, &request.reply);
    sink.report(
        SHEETS_DONE,
        &format!("Applied {} of {} parsed entries", report.applied, outcome.len()),
    );

    sink.report(SAVING, "Saving");
    let output = output_path(work_dir, job_id, &manifest.original_filename);
    save_workbook(workbook, output.clone()).await?;

    // A token reconciles once; the archive goes as soon as the result is saved
    let archive = archive.clone();
    let token = manifest.token.clone();
    match tokio::task::spawn_blocking(move || archive.remove(&token)).await {
        Ok(Ok(())) => debug!("Job {}: released archive {}", short_id(job_id), manifest.token),
        Ok(Err(e)) => warn!("Job {}: archive {} was not removed: {:#}", short_id(job_id), manifest.token, e),
        Err(e) => warn!("Job {}: archive cleanup task failed: {}", short_id(job_id), e),
    }
    info!(
        "Job {}: {} pass parsed {}, discarded {}, applied {}",
        short_id(job_id),
        outcome.pass,
        outcome.parsed,
        outcome.discarded,
        report.applied
    );

    let summary = JobSummary {
        cells_visited: outcome.len(),
        cells_translated: report.applied,
        parsed: outcome.parsed,
        discarded: outcome.discarded,
        ignored: report.ignored,
        pass: Some(outcome.pass),
        ..JobSummary::default()
    };
    Ok((output, summary))
}

async fn open_workbook(path: PathBuf) -> Result<Workbook> {
    let shown = path.clone();
    tokio::task::spawn_blocking(move || Workbook::open(&path))
        .await
        .context("Workbook loader panicked")?
        .with_context(|| format!("Failed to open workbook {:?}", shown))
}

/// Write to a `.part` sibling, then rename into place. The `.part` file is
/// removed when either step fails.
async fn save_workbook(mut workbook: Workbook, output: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = output.parent() {
            FileManager::ensure_dir(parent)?;
        }
        let mut part = output.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        let written = workbook
            .save(&part)
            .with_context(|| format!("Failed to write {:?}", part))
            .and_then(|()| {
                std::fs::rename(&part, &output).with_context(|| format!("Failed to move output to {:?}", output))
            });
        if written.is_err() {
            let _ = std::fs::remove_file(&part);
        }
        written
    })
    .await
    .context("Save task panicked")?
}
