/*!
 * Asynchronous job handling.
 *
 * - `models`: job records, requests and client-facing snapshots
 * - `registry`: the shared job table and its state machine
 * - `progress`: progress sinks and the per-sheet band
 * - `worker`: the translation and reconciliation pipelines
 * - `service`: submission, polling, retrieval and the retention reaper
 */

pub mod models;
pub mod progress;
pub mod registry;
pub mod service;
pub mod worker;

pub use models::{
    ExclusionLists, HealthReport, Job, JobId, JobKind, JobSnapshot, JobStatus, JobSummary, ReconciliationRequest,
    TranslationRequest,
};
pub use progress::{JobProgress, NoProgress, ProgressPlan, ProgressSink};
pub use registry::{JobRegistry, MAX_RUNNING_PROGRESS};
pub use service::JobService;
pub use worker::{TranslationOptions, apply_reply, translate_workbook};
