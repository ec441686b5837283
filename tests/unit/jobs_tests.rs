/*!
 * Tests for the job registry, retention and progress reporting
 */

use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sheet_translator::errors::JobError;
use sheet_translator::jobs::{
    JobKind, JobProgress, JobRegistry, JobStatus, JobSummary, MAX_RUNNING_PROGRESS, ProgressPlan, ProgressSink,
};

use crate::common;

/// Progress reaches 100 only through completion
#[test]
fn test_complete_withRunningJob_shouldReport100() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));
    let id = registry.create(JobKind::Translate);
    assert_eq!(registry.snapshot(&id)?.status, JobStatus::Pending);

    registry.mark_running(&id)?;
    registry.update_progress(&id, 100.0, "almost")?;
    assert_eq!(registry.snapshot(&id)?.progress, MAX_RUNNING_PROGRESS);

    registry.complete(&id, PathBuf::from("out.xlsx"), JobSummary::default())?;
    let snapshot = registry.snapshot(&id)?;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(snapshot.result_path, Some(PathBuf::from("out.xlsx")));
    Ok(())
}

/// A pending job may fail before it ever runs, but never complete
#[test]
fn test_transitions_fromPending_shouldAllowOnlyRunningOrFailed() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));

    let id = registry.create(JobKind::Translate);
    assert!(matches!(
        registry.complete(&id, PathBuf::from("x"), JobSummary::default()),
        Err(JobError::InvalidTransition { .. })
    ));

    registry.fail(&id, "input missing")?;
    let snapshot = registry.snapshot(&id)?;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.error.as_deref(), Some("input missing"));
    Ok(())
}

/// Retrieving a failed job reports its error
#[test]
fn test_retrieve_withFailedJob_shouldReturnFailure() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));
    let id = registry.create(JobKind::Reconcile);
    registry.mark_running(&id)?;
    registry.fail(&id, "bad token")?;

    match registry.retrieve(&id) {
        Err(JobError::Failed { message, .. }) => assert_eq!(message, "bad token"),
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}

/// Jobs are only swept once retrieved, and their result file goes with them
#[test]
fn test_sweep_expired_afterRetrieve_shouldDeleteResultFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let result = common::create_test_file(temp_dir.path(), "result.xlsx", "bytes")?;
    let registry = JobRegistry::new(Duration::from_secs(30));

    let id = registry.create(JobKind::Translate);
    registry.mark_running(&id)?;
    registry.complete(&id, result.clone(), JobSummary::default())?;

    // never observed: nothing expires, however late
    let far_future = Instant::now() + Duration::from_secs(3600);
    assert!(registry.sweep_expired(far_future).is_empty());

    assert_eq!(registry.retrieve(&id)?, result);
    assert!(registry.sweep_expired(Instant::now()).is_empty());

    let removed = registry.sweep_expired(far_future);
    assert_eq!(removed, vec![id.clone()]);
    assert!(!result.exists());
    assert_eq!(registry.snapshot(&id), Err(JobError::NotFound(id.clone())));
    Ok(())
}

/// Observing a failure through polling starts its retention
#[test]
fn test_snapshot_withFailedJob_shouldStartRetention() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(10));
    let id = registry.create(JobKind::Translate);
    registry.fail(&id, "boom")?;

    let far_future = Instant::now() + Duration::from_secs(3600);
    assert!(registry.sweep_expired(far_future).is_empty());

    registry.snapshot(&id)?;
    assert_eq!(registry.sweep_expired(far_future), vec![id]);
    assert!(registry.is_empty());
    Ok(())
}

/// Running jobs count as active; terminal ones do not
#[test]
fn test_active_count_withMixedStates_shouldCountNonTerminal() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));
    let pending = registry.create(JobKind::Translate);
    let running = registry.create(JobKind::Translate);
    let failed = registry.create(JobKind::Translate);
    registry.mark_running(&running)?;
    registry.fail(&failed, "x")?;

    assert_eq!(registry.active_count(), 2);
    assert_eq!(registry.len(), 3);
    assert!(registry.snapshot(&pending).is_ok());
    Ok(())
}

/// The progress sink forwards to the registry and ignores late reports
#[test]
fn test_job_progress_withTerminalJob_shouldIgnoreReports() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));
    let id = registry.create(JobKind::Translate);
    registry.mark_running(&id)?;
    let sink = JobProgress::new(registry.clone(), id.clone());

    sink.report(42.0, "Sheet 'Sheet1': 3/7 cells");
    let snapshot = registry.snapshot(&id)?;
    assert_eq!(snapshot.progress, 42);
    assert_eq!(snapshot.message, "Sheet 'Sheet1': 3/7 cells");

    registry.fail(&id, "stopped")?;
    sink.report(80.0, "late");
    assert_eq!(registry.snapshot(&id)?.progress, 42);
    Ok(())
}

/// Fractional reports are floored to whole percents and never round up to 100
#[test]
fn test_update_progress_withFractionalPercent_shouldStoreWholeNumber() -> Result<()> {
    let registry = JobRegistry::new(Duration::from_secs(60));
    let id = registry.create(JobKind::Translate);
    registry.mark_running(&id)?;

    registry.update_progress(&id, 33.7, "a")?;
    assert_eq!(registry.snapshot(&id)?.progress, 33);

    registry.update_progress(&id, 99.9, "b")?;
    assert_eq!(registry.snapshot(&id)?.progress, 99);
    Ok(())
}

/// Each sheet gets an equal share of the 10..90 band
#[test]
fn test_progress_plan_withFourSheets_shouldSplitEvenly() {
    let plan = ProgressPlan::new(4);
    assert_eq!(plan.sheet_progress(0, 0, 5), 10.0);
    assert_eq!(plan.sheet_progress(0, 5, 5), 30.0);
    assert_eq!(plan.sheet_progress(2, 1, 2), 60.0);
    assert_eq!(plan.sheet_progress(3, 2, 2), 90.0);
    assert_eq!(ProgressPlan::new(0).sheet_progress(0, 0, 0), 90.0);
}
