/*!
 * Extract, translate elsewhere, reconcile: the out-of-process workflow
 */

use anyhow::Result;
use std::time::Duration;

use sheet_translator::document::{CellAddress, Workbook};
use sheet_translator::extraction::{ReconcilePass, reconcile};
use sheet_translator::jobs::{ExclusionLists, JobKind, JobStatus, ReconciliationRequest, apply_reply};
use sheet_translator::language_utils::Direction;

use crate::common;

const POLL: Duration = Duration::from_millis(20);

fn text(workbook: &Workbook, reference: &str) -> Option<String> {
    let address = CellAddress::parse(reference).ok()?;
    workbook.cell_text(&address).map(str::to_string)
}

/// Only cells with Korean text are extracted, in sheet then row order
#[tokio::test]
async fn test_extract_withSampleWorkbook_shouldListKoreanCells() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(temp_dir.path());

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;

    assert_eq!(
        payload.lines(),
        vec![
            "<Sheet1!A1, 발주서>",
            "<Sheet1!A2, 수주처>",
            "<Sheet1!A3, 비고>",
            "<Sheet1!A4, 합계>",
            "<Sheet2!A1, 수량>",
        ]
    );
    assert_eq!(payload.direction, Direction::KoToZh);
    assert!(payload.prompt.contains("<Sheet1!A3, 비고>\n<Sheet1!A4, 합계>"));
    assert!(!payload.token.is_empty());

    let (manifest, archived) = service.archive().open(&payload.token)?;
    assert_eq!(manifest.original_filename, "order.xlsx");
    assert_eq!(std::fs::read(archived)?, std::fs::read(&input)?);
    Ok(())
}

/// Exclusions apply to extraction the same way they apply to translation
#[tokio::test]
async fn test_extract_withExcludedSheet_shouldSkipIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(temp_dir.path());

    let exclusions = ExclusionLists {
        sheets: vec!["Sheet2".to_string()],
        addresses: vec!["A1".to_string()],
        ..ExclusionLists::default()
    };
    let payload = service.extract(&input, Direction::KoToZh, &exclusions).await?;

    assert_eq!(payload.len(), 3);
    assert!(payload.lines().iter().all(|line| line.starts_with("<Sheet1!")));
    assert!(!payload.lines().contains(&"<Sheet1!A1, 발주서>".to_string()));
    Ok(())
}

/// A reply is applied to the archived copy, unknown addresses are ignored
#[tokio::test]
async fn test_submit_reconciliation_withReply_shouldApplyTranslations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(&temp_dir.path().join("work"));

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;
    let reply = "번역 결과:\n\
                 <Sheet1!A1, 발주서> -> 采购订单\n\
                 <Sheet1!A2, 수주처> -> 接单方\n\
                 <Sheet9!A1, 없음> -> 无\n\
                 <Sheet2!A1, 수량> -> 数量";

    let id = service.submit_reconciliation(ReconciliationRequest {
        token: payload.token.clone(),
        reply: reply.to_string(),
    });
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Completed, "error: {:?}", snapshot.error);
    assert_eq!(snapshot.kind, JobKind::Reconcile);
    let summary = snapshot.summary.expect("summary");
    assert_eq!(summary.pass, Some(ReconcilePass::Primary));
    assert_eq!(summary.parsed, 4);
    assert_eq!(summary.cells_translated, 3);
    assert_eq!(summary.ignored, 1);

    let result = service.retrieve(&id)?;
    assert!(result.to_string_lossy().ends_with("_translated_order.xlsx"));
    let translated = Workbook::open(&result)?;
    assert_eq!(text(&translated, "Sheet1!A1").as_deref(), Some("采购订单"));
    assert_eq!(text(&translated, "Sheet1!A2").as_deref(), Some("接单方"));
    assert_eq!(text(&translated, "Sheet1!A3").as_deref(), Some("비고"));
    assert_eq!(text(&translated, "Sheet2!A1").as_deref(), Some("数量"));

    let original = Workbook::open(&input)?;
    assert_eq!(text(&original, "Sheet1!A1").as_deref(), Some("발주서"));
    assert_eq!(service.archive().dir().read_dir()?.count(), 0);
    Ok(())
}

/// Every extracted token comes back through reconciliation, whatever the
/// sheet names and cell texts contain
#[tokio::test]
async fn test_reconcile_withRepliedTokens_shouldRecoverEveryCell() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_workbook(
        temp_dir.path(),
        "awkward.xlsx",
        &[
            ("매출, 2024", &[("A1", "단가 > 1000"), ("B2", "수량 <최소>"), ("A3", "비고")][..]),
            ("Bob's 계획", &[("C1", "합계, 총액")][..]),
            ("Sheet1", &[("A1", "발주서")][..]),
        ],
    )?;
    let service = common::dictionary_service(&temp_dir.path().join("work"));

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;
    assert_eq!(payload.len(), 5);
    assert!(payload.lines().contains(&"<'매출, 2024'!A1, 단가 > 1000>".to_string()));

    let reply: Vec<String> = payload
        .cells
        .iter()
        .enumerate()
        .map(|(i, cell)| format!("{} -> 译文{}", cell.token(), i))
        .collect();
    let reply = reply.join("\n");

    let outcome = reconcile(&reply);
    assert_eq!(outcome.discarded, 0);
    assert_eq!(outcome.len(), payload.len());
    for (i, cell) in payload.cells.iter().enumerate() {
        assert_eq!(outcome.translations.get(&cell.address), Some(&format!("译文{}", i)));
    }

    let id = service.submit_reconciliation(ReconciliationRequest {
        token: payload.token.clone(),
        reply,
    });
    let snapshot = service.wait_for(&id, POLL).await?;
    assert_eq!(snapshot.status, JobStatus::Completed, "error: {:?}", snapshot.error);
    assert_eq!(snapshot.summary.expect("summary").cells_translated, payload.len());

    let translated = Workbook::open(&service.retrieve(&id)?)?;
    for (i, cell) in payload.cells.iter().enumerate() {
        assert_eq!(translated.cell_text(&cell.address), Some(format!("译文{}", i).as_str()));
    }
    Ok(())
}

/// A token is consumed by its reconciliation
#[tokio::test]
async fn test_submit_reconciliation_twice_shouldRejectSpentToken() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(&temp_dir.path().join("work"));

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;
    let reply = "<Sheet1!A1, 발주서> -> 采购订单".to_string();

    let first = service.submit_reconciliation(ReconciliationRequest {
        token: payload.token.clone(),
        reply: reply.clone(),
    });
    assert_eq!(service.wait_for(&first, POLL).await?.status, JobStatus::Completed);

    let second = service.submit_reconciliation(ReconciliationRequest {
        token: payload.token,
        reply,
    });
    let snapshot = service.wait_for(&second, POLL).await?;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.error.unwrap_or_default().contains("Unknown extraction token"));
    Ok(())
}

/// The reaper sweeps archives whose reply never arrived
#[tokio::test]
async fn test_spawn_reaper_withStaleArchive_shouldSweepIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(&temp_dir.path().join("work")).with_archive_retention(Duration::ZERO);

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;
    assert!(service.archive().open(&payload.token).is_ok());

    let reaper = service.spawn_reaper(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(200)).await;
    reaper.abort();

    assert!(service.archive().open(&payload.token).is_err());
    assert_eq!(service.archive().dir().read_dir()?.count(), 0);
    Ok(())
}

/// A token that was never issued fails the job
#[tokio::test]
async fn test_submit_reconciliation_withUnknownToken_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let service = common::dictionary_service(temp_dir.path());

    let id = service.submit_reconciliation(ReconciliationRequest {
        token: "0123456789abcdef".to_string(),
        reply: "<Sheet1!A1, 발주서> -> 订单书".to_string(),
    });
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.error.unwrap_or_default().contains("Unknown extraction token"));
    Ok(())
}

/// An archive modified after extraction is rejected
#[tokio::test]
async fn test_submit_reconciliation_withTamperedArchive_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let service = common::dictionary_service(temp_dir.path());

    let payload = service
        .extract(&input, Direction::KoToZh, &ExclusionLists::default())
        .await?;
    let (_, archived) = service.archive().open(&payload.token)?;
    std::fs::write(&archived, b"tampered")?;

    let id = service.submit_reconciliation(ReconciliationRequest {
        token: payload.token,
        reply: "<Sheet1!A1, 발주서> -> 订单书".to_string(),
    });
    let snapshot = service.wait_for(&id, POLL).await?;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.error.unwrap_or_default().contains("checksum mismatch"));
    Ok(())
}

/// Loosely formatted replies still land through the fallback pass
#[tokio::test]
async fn test_apply_reply_withWrappedReply_shouldUseFallback() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_sample_workbook(temp_dir.path(), "order.xlsx")?;
    let mut workbook = Workbook::open(&input)?;

    let reply = "Sheet1!A3, 비고 →\n备注\nSheet1!A4: 合计\nSheet1!C2: 不应写入";
    let (outcome, report) = apply_reply(&mut workbook, reply);

    assert_eq!(outcome.pass, ReconcilePass::Fallback);
    assert_eq!(outcome.len(), 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.ignored, 1);
    assert_eq!(text(&workbook, "Sheet1!A3").as_deref(), Some("备注"));
    assert_eq!(text(&workbook, "Sheet1!A4").as_deref(), Some("合计"));
    Ok(())
}
