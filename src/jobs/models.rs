/*!
 * Job records and the DTOs handed to clients.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::extraction::ReconcilePass;
use crate::language_utils::Direction;

/// Opaque job identifier (UUID v4 string)
pub type JobId = String;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, worker not started yet
    Pending,
    /// Worker is processing
    Running,
    /// Result written and available
    Completed,
    /// Unrecoverable error occurred
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Translate a workbook through the resolver
    Translate,
    /// Apply an external reply to an archived workbook
    Reconcile,
}

/// Counters a finished job reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Cells visited after exclusions
    pub cells_visited: usize,
    /// Cells whose text changed
    pub cells_translated: usize,
    /// Cells answered by the term table alone
    pub dictionary_hits: usize,
    /// Cells answered by a backend
    pub backend_hits: usize,
    /// Reply entries parsed (reconciliation)
    pub parsed: usize,
    /// Reply entries dropped (reconciliation)
    pub discarded: usize,
    /// Mapped addresses with no live cell (reconciliation)
    pub ignored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<ReconcilePass>,
}

/// Registry record; only the registry mutates it
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// 0 to 100, never decreasing
    pub progress: u8,
    pub message: String,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>,
    pub summary: Option<JobSummary>,
    pub created_at: Instant,
    /// Set once the result was handed out or the failure observed
    pub expires_at: Option<Instant>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued".to_string(),
            result_path: None,
            error: None,
            summary: None,
            created_at: Instant::now(),
            expires_at: None,
        }
    }

    /// First 8 characters, for log messages
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First 8 characters of a job id
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Consistent view of a job for polling clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Whole percent, 0 to 100
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            result_path: job.result_path.clone(),
            error: job.error.clone(),
            summary: job.summary.clone(),
        }
    }
}

/// Exclusion lists exactly as the user typed them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionLists {
    /// Addresses and ranges, e.g. `A1`, `Sheet1!B2:C9`, `A:C`
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub sheets: Vec<String>,
    /// Case-insensitive substrings
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ExclusionLists {
    pub fn to_rules(&self) -> crate::translation::ExclusionRules {
        crate::translation::ExclusionRules::from_lists(&self.addresses, &self.sheets, &self.patterns)
    }
}

/// Parameters of a translation submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub input_path: PathBuf,
    /// Name used for the output file; defaults to the input file name
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_true")]
    pub preserve_latin: bool,
    #[serde(default)]
    pub add_new_sheet: bool,
    #[serde(default)]
    pub exclusions: ExclusionLists,
}

impl TranslationRequest {
    pub fn new(input_path: impl Into<PathBuf>, direction: Direction) -> Self {
        Self {
            input_path: input_path.into(),
            original_filename: None,
            direction,
            preserve_latin: true,
            add_new_sheet: false,
            exclusions: ExclusionLists::default(),
        }
    }

    /// File name the output is derived from
    pub fn display_filename(&self) -> String {
        self.original_filename.clone().unwrap_or_else(|| {
            self.input_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        })
    }
}

/// Parameters of a reconciliation submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    /// Token returned by extraction
    pub token: String,
    /// Free-form reply text
    pub reply: String,
}

/// Health probe answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub active_jobs: usize,
    pub tracked_jobs: usize,
}

fn default_true() -> bool {
    true
}
