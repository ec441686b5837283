use log::debug;

use super::models::short_id;
use super::registry::JobRegistry;

/// End of the load/prepare band
pub const LOAD_DONE: f64 = 10.0;
/// End of the per-sheet band
pub const SHEETS_DONE: f64 = 90.0;
/// Reported while the output is written
pub const SAVING: f64 = 95.0;

/// Receiver of progress reports from every stage of a job
pub trait ProgressSink: Send + Sync {
    /// Report `percent` (0 to 100) with a short status message
    fn report(&self, percent: f64, message: &str);
}

/// Sink that forwards to the registry record of one job
#[derive(Debug, Clone)]
pub struct JobProgress {
    registry: JobRegistry,
    id: String,
}

impl JobProgress {
    pub fn new(registry: JobRegistry, id: impl Into<String>) -> Self {
        Self {
            registry,
            id: id.into(),
        }
    }
}

impl ProgressSink for JobProgress {
    fn report(&self, percent: f64, message: &str) {
        if let Err(e) = self.registry.update_progress(&self.id, percent, message) {
            debug!("Dropped progress for job {}: {}", short_id(&self.id), e);
        }
    }
}

/// Sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}

/// Maps per-sheet cell progress onto the sheet band.
///
/// Each sheet owns an equal share of the band; inside a sheet progress moves
/// with processed cells over total cells.
#[derive(Debug, Clone, Copy)]
pub struct ProgressPlan {
    total_sheets: usize,
}

impl ProgressPlan {
    pub fn new(total_sheets: usize) -> Self {
        Self { total_sheets }
    }

    /// Overall percentage after `done` of `total` cells of sheet `index`
    pub fn sheet_progress(&self, index: usize, done: usize, total: usize) -> f64 {
        if self.total_sheets == 0 {
            return SHEETS_DONE;
        }
        let within = if total == 0 {
            1.0
        } else {
            (done.min(total) as f64) / (total as f64)
        };
        let share = (SHEETS_DONE - LOAD_DONE) / self.total_sheets as f64;
        LOAD_DONE + share * (index.min(self.total_sheets) as f64 + within)
    }
}
