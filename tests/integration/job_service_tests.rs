/*!
 * Job service tests: submission, polling, retrieval and failure handling
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use sheet_translator::document::{CellAddress, Workbook};
use sheet_translator::errors::JobError;
use sheet_translator::jobs::{ExclusionLists, JobKind, JobService, JobStatus, TranslationRequest};
use sheet_translator::language_utils::Direction;
use sheet_translator::providers::TranslationBackend;
use sheet_translator::providers::mock::MockBackend;

use crate::common;

const POLL: Duration = Duration::from_millis(20);

/// A submitted translation runs to completion and its result can be retrieved
#[tokio::test]
async fn test_submit_translation_withValidWorkbook_shouldComplete() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(&temp_dir.path().join("work"));

    let id = service.submit_translation(TranslationRequest::new(&input, Direction::KoToZh));
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Completed, "error: {:?}", snapshot.error);
    assert_eq!(snapshot.kind, JobKind::Translate);
    assert_eq!(snapshot.progress, 100);
    let summary = snapshot.summary.expect("summary");
    assert_eq!(summary.cells_translated, 5);

    let result = service.retrieve(&id)?;
    assert!(result.starts_with(temp_dir.path().join("work")));
    assert!(result.to_string_lossy().ends_with("_translated_order.xlsx"));

    let translated = Workbook::open(&result)?;
    assert_eq!(
        translated.cell_text(&CellAddress::new("Sheet1", 1, 1)),
        Some("订单书")
    );
    assert!(!temp_dir.path().join("work").read_dir()?.any(|e| {
        e.map(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .unwrap_or(false)
    }));
    Ok(())
}

/// The original filename in the request names the output
#[tokio::test]
async fn test_submit_translation_withOriginalFilename_shouldUseItForOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "upload-1234.xlsx")?;
    let service = common::dictionary_service(temp_dir.path());

    let mut request = TranslationRequest::new(&input, Direction::KoToZh);
    request.original_filename = Some("발주서.xlsx".to_string());
    let id = service.submit_translation(request);
    service.wait_for(&id, POLL).await?;

    let result = service.retrieve(&id)?;
    assert_eq!(
        result.file_name().map(|n| n.to_string_lossy().to_string()),
        Some(format!("{}_translated_발주서.xlsx", id))
    );
    Ok(())
}

/// Backends are only asked for what the dictionary cannot answer
#[tokio::test]
async fn test_submit_translation_withDictionaryCoverage_shouldNotCallBackend() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let backend = Arc::new(MockBackend::working(&[]));
    let chain: Vec<Arc<dyn TranslationBackend>> = vec![backend.clone()];
    let service = JobService::new(
        common::resolver_with(chain),
        temp_dir.path(),
        Duration::from_secs(60),
    );

    let mut request = TranslationRequest::new(&input, Direction::KoToZh);
    request.exclusions = ExclusionLists {
        addresses: vec!["A3:A4".to_string()],
        ..ExclusionLists::default()
    };
    let id = service.submit_translation(request);
    let snapshot = service.wait_for(&id, POLL).await?;

    let summary = snapshot.summary.expect("summary");
    assert_eq!(summary.cells_visited, 4);
    assert_eq!(summary.dictionary_hits, 3);
    assert_eq!(summary.backend_hits, 0);
    assert_eq!(backend.request_count(), 0);
    Ok(())
}

/// A missing input fails the job and the failure is retrievable
#[tokio::test]
async fn test_submit_translation_withMissingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let service = common::dictionary_service(temp_dir.path());

    let id = service.submit_translation(TranslationRequest::new(
        temp_dir.path().join("missing.xlsx"),
        Direction::KoToZh,
    ));
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.progress < 100);
    assert!(snapshot.error.unwrap_or_default().contains("missing.xlsx"));
    assert!(matches!(service.retrieve(&id), Err(JobError::Failed { .. })));
    Ok(())
}

/// A file that is not a zip package fails cleanly
#[tokio::test]
async fn test_submit_translation_withCorruptWorkbook_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "broken.xlsx", "not a zip")?;
    let service = common::dictionary_service(temp_dir.path());

    let id = service.submit_translation(TranslationRequest::new(&input, Direction::KoToZh));
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Failed);
    Ok(())
}

/// Unknown ids are reported as such
#[tokio::test]
async fn test_poll_withUnknownId_shouldReturnNotFound() {
    let temp_dir = common::create_temp_dir().unwrap();
    let service = common::dictionary_service(temp_dir.path());

    assert_eq!(service.poll("nope"), Err(JobError::NotFound("nope".to_string())));
    assert_eq!(service.retrieve("nope"), Err(JobError::NotFound("nope".to_string())));
}

/// Health reports tracked and active jobs
#[tokio::test]
async fn test_health_afterCompletedJob_shouldCountIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(temp_dir.path());

    let health = service.health();
    assert_eq!(health.status, "ok");
    assert_eq!(health.tracked_jobs, 0);

    let id = service.submit_translation(TranslationRequest::new(&input, Direction::KoToZh));
    service.wait_for(&id, POLL).await?;

    let health = service.health();
    assert_eq!(health.tracked_jobs, 1);
    assert_eq!(health.active_jobs, 0);
    Ok(())
}

/// The reaper removes retrieved jobs once their retention runs out
#[tokio::test]
async fn test_spawn_reaper_withShortRetention_shouldRemoveResult() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = JobService::new(
        common::resolver_with(Vec::new()),
        temp_dir.path().join("work"),
        Duration::from_millis(50),
    );

    let id = service.submit_translation(TranslationRequest::new(&input, Direction::KoToZh));
    service.wait_for(&id, POLL).await?;
    let result = service.retrieve(&id)?;
    assert!(result.exists());

    let reaper = service.spawn_reaper(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(300)).await;
    reaper.abort();

    assert!(!result.exists());
    assert_eq!(service.poll(&id), Err(JobError::NotFound(id.clone())));
    Ok(())
}

/// A worker that panics fails its job instead of leaving it running
#[tokio::test]
async fn test_submit_translation_withPanickingBackend_shouldFailJob() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_workbook(
        temp_dir.path(),
        "notes.xlsx",
        &[("Sheet1", &[("A1", "사전에 없는 새 문장")][..])],
    )?;
    let chain: Vec<Arc<dyn TranslationBackend>> = vec![Arc::new(MockBackend::panicking())];
    let service = JobService::new(common::resolver_with(chain), temp_dir.path(), Duration::from_secs(60));

    let id = service.submit_translation(TranslationRequest::new(&input, Direction::KoToZh));
    let snapshot = tokio::time::timeout(Duration::from_secs(5), service.wait_for(&id, POLL)).await??;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.progress < 100);
    assert!(snapshot.error.unwrap_or_default().contains("Worker task failed"));
    assert_eq!(service.health().active_jobs, 0);
    Ok(())
}
