//! Integration tests for the receipt workflow engine
//!
//! Each test runs against a fresh SQLite database and a temporary storage
//! root, with a recording mailer standing in for the SMTP gateway.

mod support;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use receipts::error::{AppError, AppResult};
use receipts::hooks::{NotificationHooks, ReceiptHook};
use receipts::models::{Clearance, Receipt, ReceiptStatus, ReceiptSubmission, User, user::SENTINEL_USER_ID};
use receipts::repositories::{ReceiptRepository, UserRepository};
use receipts::storage::{ReceiptStorage, Stage};
use receipts::workflow::ReceiptWorkflow;

use support::{FailingMailer, RecordingMailer, seed_user, test_pool};

const FINANCE_INBOX: &str = "finance@example.com";
const BASE_URL: &str = "http://localhost:3000";

struct Fixture {
    pool: SqlitePool,
    workflow: ReceiptWorkflow,
    storage: ReceiptStorage,
    mailer: RecordingMailer,
    owner: User,
    _db_dir: TempDir,
    _storage_dir: TempDir,
}

async fn fixture() -> Fixture {
    let (pool, db_dir) = test_pool().await;
    let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
    let storage = ReceiptStorage::new(storage_dir.path());
    let mailer = RecordingMailer::default();

    let workflow = ReceiptWorkflow::new(
        ReceiptRepository::new(pool.clone()),
        UserRepository::new(pool.clone()),
        storage.clone(),
    )
    .with_hook(Arc::new(NotificationHooks::new(
        Arc::new(mailer.clone()),
        Some(FINANCE_INBOX.to_string()),
        BASE_URL.to_string(),
    )));

    let owner = seed_user(&pool, "Kalle Kula", "kalle@example.com", "Secret12345", Clearance::USER).await;

    Fixture {
        pool,
        workflow,
        storage,
        mailer,
        owner,
        _db_dir: db_dir,
        _storage_dir: storage_dir,
    }
}

fn submission(activity: &str, amount: i64, filename: &str) -> ReceiptSubmission {
    ReceiptSubmission {
        receipt_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        activity: activity.to_string(),
        amount,
        original_filename: filename.to_string(),
        content: b"%PDF-1.4 fake receipt".to_vec(),
    }
}

fn file_on_disk(receipt: &Receipt) -> bool {
    Path::new(&receipt.file.path)
        .join(&receipt.file.filename)
        .exists()
}

#[tokio::test]
async fn test_submit_places_file_and_notifies() {
    let f = fixture().await;

    let outcome = f
        .workflow
        .submit(&f.owner, submission("Team dinner", 1234, "kvitto.pdf"))
        .await
        .expect("Failed to submit receipt");

    let receipt = &outcome.receipt;
    assert_eq!(receipt.status, ReceiptStatus::Pending);
    assert_eq!(receipt.amount, 1234);
    assert!(!receipt.archived);
    assert!(outcome.warnings.is_empty());

    let today = Utc::now().date_naive();
    let expected_dir = f.storage.stage_dir(Stage::Submitted, today);
    assert_eq!(receipt.file.path, expected_dir.display().to_string());
    assert!(receipt.file.filename.ends_with(".pdf"));
    assert!(file_on_disk(receipt));

    let sent = f.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, FINANCE_INBOX);
    assert!(sent[0].body.contains("Kalle Kula"));
    assert!(sent[0].body.contains(&format!("/receipts/{}", receipt.id)));
}

#[tokio::test]
async fn test_submit_validation() {
    let f = fixture().await;

    let err = f
        .workflow
        .submit(&f.owner, submission("  ", 100, "kvitto.pdf"))
        .await
        .expect_err("Empty activity must be rejected");
    assert!(matches!(err, AppError::Validation(_)));

    let err = f
        .workflow
        .submit(&f.owner, submission("Dinner", -1, "kvitto.pdf"))
        .await
        .expect_err("Negative amount must be rejected");
    assert!(matches!(err, AppError::Validation(_)));

    let err = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "notes.txt"))
        .await
        .expect_err("Disallowed extension must be rejected");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_uniquify_appends_counter() {
    let f = fixture().await;
    let receipts = ReceiptRepository::new(f.pool.clone());
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let first = f
        .storage
        .place_new(&receipts, date, "receipt.pdf", b"one")
        .await
        .unwrap();
    let second = f
        .storage
        .place_new(&receipts, date, "receipt.pdf", b"two")
        .await
        .unwrap();
    let third = f
        .storage
        .place_new(&receipts, date, "receipt.pdf", b"three")
        .await
        .unwrap();

    assert_eq!(first.filename, "receipt.pdf");
    assert_eq!(second.filename, "receipt_1.pdf");
    assert_eq!(third.filename, "receipt_2.pdf");
}

#[tokio::test]
async fn test_uniquify_consults_file_records() {
    // A filename is taken even when the matching file sits in another stage
    // directory on disk.
    let f = fixture().await;
    let receipts = ReceiptRepository::new(f.pool.clone());

    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();
    f.workflow.approve(outcome.receipt.id).await.unwrap();

    let today = Utc::now().date_naive();
    let taken = outcome.receipt.file.filename.clone();
    let placed = f
        .storage
        .place_new(&receipts, today, &taken, b"clash")
        .await
        .unwrap();
    assert_ne!(placed.filename, taken);
}

#[tokio::test]
async fn test_approve_moves_file() {
    let f = fixture().await;
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();
    let submitted_path = outcome.receipt.file.path.clone();

    let approved = f.workflow.approve(outcome.receipt.id).await.unwrap();
    let receipt = &approved.receipt;

    assert_eq!(receipt.status, ReceiptStatus::Handled);
    let expected_dir = f.storage.stage_dir(Stage::Approved, receipt.submit_date);
    assert_eq!(receipt.file.path, expected_dir.display().to_string());
    assert!(file_on_disk(receipt));
    assert!(
        !Path::new(&submitted_path)
            .join(&receipt.file.filename)
            .exists()
    );
}

#[tokio::test]
async fn test_approve_twice_conflicts() {
    let f = fixture().await;
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();

    f.workflow.approve(outcome.receipt.id).await.unwrap();
    let err = f
        .workflow
        .approve(outcome.receipt.id)
        .await
        .expect_err("Approving a handled receipt must conflict");
    assert!(matches!(err, AppError::Conflict));
}

#[tokio::test]
async fn test_transition_not_found() {
    let f = fixture().await;
    assert!(matches!(f.workflow.approve(9999).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        f.workflow.reject(9999, "reason").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(f.workflow.archive(9999).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_reject_requires_reason_and_notifies_owner() {
    let f = fixture().await;
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();

    let err = f
        .workflow
        .reject(outcome.receipt.id, "  ")
        .await
        .expect_err("Blank reason must be rejected");
    assert!(matches!(err, AppError::Validation(_)));

    let rejected = f
        .workflow
        .reject(outcome.receipt.id, "Missing itemization")
        .await
        .unwrap();
    let receipt = &rejected.receipt;

    assert_eq!(receipt.status, ReceiptStatus::Rejected);
    assert_eq!(receipt.status_comment.as_deref(), Some("Missing itemization"));
    let expected_dir = f.storage.stage_dir(Stage::Rejected, receipt.submit_date);
    assert_eq!(receipt.file.path, expected_dir.display().to_string());
    assert!(file_on_disk(receipt));

    // Submission notice plus rejection notice.
    let sent = f.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].recipient, f.owner.email);
}

#[tokio::test]
async fn test_reject_after_owner_deleted_sends_no_owner_mail() {
    let f = fixture().await;
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();

    let users = UserRepository::new(f.pool.clone());
    assert!(users.delete_and_reassign(f.owner.id).await.unwrap());

    let rejected = f
        .workflow
        .reject(outcome.receipt.id, "Submitter left the company")
        .await
        .expect("Rejection must succeed without an owner");
    assert_eq!(rejected.receipt.user_id, SENTINEL_USER_ID);
    assert_eq!(rejected.receipt.status, ReceiptStatus::Rejected);

    // Only the submission notice went out; the sentinel gets no mail.
    let sent = f.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, FINANCE_INBOX);
}

#[tokio::test]
async fn test_approve_then_resubmit_returns_to_submitted() {
    let f = fixture().await;
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();

    f.workflow.approve(outcome.receipt.id).await.unwrap();
    let resubmitted = f.workflow.resubmit(outcome.receipt.id).await.unwrap();
    let receipt = &resubmitted.receipt;

    assert_eq!(receipt.status, ReceiptStatus::Pending);
    let expected_dir = f.storage.stage_dir(Stage::Submitted, receipt.submit_date);
    assert_eq!(receipt.file.path, expected_dir.display().to_string());
    assert!(file_on_disk(receipt));

    // A pending receipt has nothing to resubmit.
    let err = f
        .workflow
        .resubmit(outcome.receipt.id)
        .await
        .expect_err("Resubmitting a pending receipt must conflict");
    assert!(matches!(err, AppError::Conflict));
}

#[tokio::test]
async fn test_archive_is_idempotent() {
    let f = fixture().await;
    let receipts = ReceiptRepository::new(f.pool.clone());
    let outcome = f
        .workflow
        .submit(&f.owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .unwrap();

    let archived = f.workflow.archive(outcome.receipt.id).await.unwrap();
    assert!(archived.receipt.archived);

    // No-op success the second time.
    let archived = f.workflow.archive(outcome.receipt.id).await.unwrap();
    assert!(archived.receipt.archived);

    let active = receipts.list_all(Some(false)).await.unwrap();
    assert!(active.is_empty());
    let archived = receipts.list_all(Some(true)).await.unwrap();
    assert_eq!(archived.len(), 1);
}

#[tokio::test]
async fn test_listing_orders_by_status_then_dates() {
    let f = fixture().await;
    let receipts = ReceiptRepository::new(f.pool.clone());

    let rejected = f
        .workflow
        .submit(&f.owner, submission("First", 100, "a.pdf"))
        .await
        .unwrap();
    f.workflow
        .reject(rejected.receipt.id, "Not itemized")
        .await
        .unwrap();

    let pending = f
        .workflow
        .submit(&f.owner, submission("Second", 200, "b.pdf"))
        .await
        .unwrap();

    let handled = f
        .workflow
        .submit(&f.owner, submission("Third", 300, "c.pdf"))
        .await
        .unwrap();
    f.workflow.approve(handled.receipt.id).await.unwrap();

    let listed = receipts.list_by_owner(f.owner.id).await.unwrap();
    let statuses: Vec<ReceiptStatus> = listed.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ReceiptStatus::Pending, ReceiptStatus::Handled, ReceiptStatus::Rejected]
    );
    assert_eq!(listed[0].id, pending.receipt.id);
}

#[tokio::test]
async fn test_notification_failure_is_warning_not_rollback() {
    let (pool, _db_dir) = test_pool().await;
    let storage_dir = tempfile::tempdir().unwrap();
    let receipts = ReceiptRepository::new(pool.clone());
    let workflow = ReceiptWorkflow::new(
        receipts.clone(),
        UserRepository::new(pool.clone()),
        ReceiptStorage::new(storage_dir.path()),
    )
    .with_hook(Arc::new(NotificationHooks::new(
        Arc::new(FailingMailer),
        Some(FINANCE_INBOX.to_string()),
        BASE_URL.to_string(),
    )));
    let owner = seed_user(&pool, "Kalle", "kalle@example.com", "Secret12345", Clearance::USER).await;

    let outcome = workflow
        .submit(&owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .expect("Mail failure must not roll back the submission");

    assert_eq!(outcome.warnings.len(), 1);
    assert!(receipts.get(outcome.receipt.id).await.unwrap().is_some());
}

struct VetoHook;

#[async_trait]
impl ReceiptHook for VetoHook {
    async fn pre_submit(&self, _: &ReceiptSubmission, _: &User) -> AppResult<()> {
        Err(AppError::Validation("Submissions are closed".to_string()))
    }
}

#[tokio::test]
async fn test_pre_submit_hook_can_veto() {
    let (pool, _db_dir) = test_pool().await;
    let storage_dir = tempfile::tempdir().unwrap();
    let receipts = ReceiptRepository::new(pool.clone());
    let workflow = ReceiptWorkflow::new(
        receipts.clone(),
        UserRepository::new(pool.clone()),
        ReceiptStorage::new(storage_dir.path()),
    )
    .with_hook(Arc::new(VetoHook));
    let owner = seed_user(&pool, "Kalle", "kalle@example.com", "Secret12345", Clearance::USER).await;

    let err = workflow
        .submit(&owner, submission("Dinner", 100, "kvitto.pdf"))
        .await
        .expect_err("Veto must abort the submission");
    assert!(matches!(err, AppError::Validation(_)));

    assert!(receipts.list_by_owner(owner.id).await.unwrap().is_empty());
}
