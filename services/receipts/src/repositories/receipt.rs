//! Receipt repository for database operations

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{NewReceipt, Receipt, ReceiptStatus, StoredFile};

/// Receipt repository
#[derive(Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

const RECEIPT_COLUMNS: &str = "r.id, r.user_id, r.receipt_date, r.submit_date, r.activity, \
     r.amount, r.status_id, r.status_comment, r.archived, \
     f.id AS file_id, f.path AS file_path, f.filename AS file_filename";

/// Listings group by workflow urgency first, then age
const RECEIPT_ORDERING: &str = "ORDER BY r.status_id, r.submit_date, r.receipt_date";

fn map_receipt(row: SqliteRow) -> AppResult<Receipt> {
    let status_id: i64 = row.get("status_id");
    let status = ReceiptStatus::from_id(status_id).ok_or_else(|| {
        AppError::Internal(format!("Unknown receipt status id {} in database", status_id))
    })?;

    Ok(Receipt {
        id: row.get("id"),
        user_id: row.get("user_id"),
        receipt_date: row.get("receipt_date"),
        submit_date: row.get("submit_date"),
        activity: row.get("activity"),
        amount: row.get("amount"),
        status,
        status_comment: row.get("status_comment"),
        archived: row.get("archived"),
        file: StoredFile {
            id: row.get("file_id"),
            path: row.get("file_path"),
            filename: row.get("file_filename"),
        },
    })
}

/// Result of a checked status transition
///
/// `previous_path` is where the file physically lives until the caller
/// performs the move.
#[derive(Debug)]
pub struct StatusTransition {
    pub receipt: Receipt,
    pub previous_path: String,
}

impl ReceiptRepository {
    /// Create a new receipt repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a receipt together with its file record in one transaction
    pub async fn insert(&self, new_receipt: &NewReceipt) -> AppResult<Receipt> {
        let mut tx = self.pool.begin().await?;

        let file_id: i64 =
            sqlx::query("INSERT INTO files (path, filename) VALUES ($1, $2) RETURNING id")
                .bind(&new_receipt.path)
                .bind(&new_receipt.filename)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Persistence(
                        format!("Filename {} is already taken", new_receipt.filename),
                    ),
                    _ => AppError::Database(e),
                })?
                .get("id");

        let receipt_id: i64 = sqlx::query(
            r#"
            INSERT INTO receipts
                (user_id, receipt_date, submit_date, activity, amount, status_id, file_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(new_receipt.user_id)
        .bind(new_receipt.receipt_date)
        .bind(new_receipt.submit_date)
        .bind(&new_receipt.activity)
        .bind(new_receipt.amount)
        .bind(ReceiptStatus::Pending.id())
        .bind(file_id)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        tx.commit().await?;
        info!("Inserted receipt {} for user {}", receipt_id, new_receipt.user_id);

        self.get(receipt_id)
            .await?
            .ok_or(AppError::NotFound("Receipt"))
    }

    /// Fetch a receipt with its file record
    pub async fn get(&self, id: i64) -> AppResult<Option<Receipt>> {
        let row = sqlx::query(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts r JOIN files f ON f.id = r.file_id \
             WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_receipt).transpose()
    }

    /// List a user's receipts ordered by (status, submit date, receipt date)
    pub async fn list_by_owner(&self, user_id: i64) -> AppResult<Vec<Receipt>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts r JOIN files f ON f.id = r.file_id \
             WHERE r.user_id = $1 {RECEIPT_ORDERING}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_receipt).collect()
    }

    /// List all receipts; `archived` filters by archive flag, `None` lists
    /// everything
    pub async fn list_all(&self, archived: Option<bool>) -> AppResult<Vec<Receipt>> {
        let rows = match archived {
            Some(archived) => {
                sqlx::query(&format!(
                    "SELECT {RECEIPT_COLUMNS} FROM receipts r JOIN files f ON f.id = r.file_id \
                     WHERE r.archived = $1 {RECEIPT_ORDERING}"
                ))
                .bind(archived)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {RECEIPT_COLUMNS} FROM receipts r JOIN files f ON f.id = r.file_id \
                     {RECEIPT_ORDERING}"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(map_receipt).collect()
    }

    /// Whether a filename is already recorded in the file store
    pub async fn file_exists(&self, filename: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM files WHERE filename = $1")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Apply a status transition after re-checking the current status
    ///
    /// The receipt is re-read inside the transaction; when its status is no
    /// longer one of `expected` the transition fails with `Conflict` instead
    /// of overwriting a concurrent reviewer's decision. The file record's
    /// path is updated in the same transaction; the physical move is the
    /// caller's follow-up step.
    pub async fn transition_status(
        &self,
        id: i64,
        expected: &[ReceiptStatus],
        new_status: ReceiptStatus,
        comment: Option<&str>,
        new_path: &str,
    ) -> AppResult<StatusTransition> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts r JOIN files f ON f.id = r.file_id \
             WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match row {
            Some(row) => map_receipt(row)?,
            None => return Err(AppError::NotFound("Receipt")),
        };

        if !expected.contains(&current.status) {
            return Err(AppError::Conflict);
        }

        sqlx::query("UPDATE receipts SET status_id = $1, status_comment = $2 WHERE id = $3")
            .bind(new_status.id())
            .bind(comment)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE files SET path = $1 WHERE id = $2")
            .bind(new_path)
            .bind(current.file.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(
            "Receipt {} moved from {} to {}",
            id,
            current.status.display_name(),
            new_status.display_name()
        );

        let previous_path = current.file.path.clone();
        let mut receipt = current;
        receipt.status = new_status;
        receipt.status_comment = comment.map(str::to_string);
        receipt.file.path = new_path.to_string();

        Ok(StatusTransition {
            receipt,
            previous_path,
        })
    }

    /// Mark a receipt archived; false when the id does not resolve.
    /// Archiving an already-archived receipt is a no-op success.
    pub async fn set_archived(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE receipts SET archived = 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
