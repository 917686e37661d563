//! Receipt workflow engine
//!
//! The state machine driving submit, approve, reject, resubmit, and archive.
//! Transitions persist first and move the physical file second; hooks run
//! around each transition. Capability checks (CFO for every reviewing
//! transition, owner-or-CFO for reads) belong to the HTTP layer — every
//! state-mutating method here assumes they already passed.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::hooks::ReceiptHook;
use crate::models::{NewReceipt, Receipt, ReceiptStatus, ReceiptSubmission, User, user::SENTINEL_USER_ID};
use crate::repositories::{ReceiptRepository, UserRepository};
use crate::storage::{ReceiptStorage, Stage};
use crate::validation;

/// A transition result with advisory warnings from post-hooks
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub receipt: Receipt,
    pub warnings: Vec<String>,
}

/// Receipt workflow engine
#[derive(Clone)]
pub struct ReceiptWorkflow {
    receipts: ReceiptRepository,
    users: UserRepository,
    storage: ReceiptStorage,
    hooks: Vec<Arc<dyn ReceiptHook>>,
}

impl ReceiptWorkflow {
    pub fn new(receipts: ReceiptRepository, users: UserRepository, storage: ReceiptStorage) -> Self {
        Self {
            receipts,
            users,
            storage,
            hooks: Vec::new(),
        }
    }

    /// Append a hook; hooks run in registration order
    pub fn with_hook(mut self, hook: Arc<dyn ReceiptHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Submit a new receipt for review
    ///
    /// Validates the metadata, runs pre-submit hooks (which may veto),
    /// places the upload under `submitted/<today>/`, and inserts the receipt
    /// with its file record in one transaction. Post-submit notification
    /// failures are returned as warnings, never rolled back.
    pub async fn submit(
        &self,
        owner: &User,
        submission: ReceiptSubmission,
    ) -> AppResult<WorkflowOutcome> {
        validation::validate_activity(&submission.activity).map_err(AppError::Validation)?;
        validation::validate_receipt_filename(&submission.original_filename)
            .map_err(AppError::Validation)?;
        if submission.amount < 0 {
            return Err(AppError::Validation("Amount must not be negative".to_string()));
        }
        if submission.content.is_empty() {
            return Err(AppError::Validation("A receipt file is required".to_string()));
        }

        for hook in &self.hooks {
            hook.pre_submit(&submission, owner).await?;
        }

        let submit_date = Utc::now().date_naive();
        let extension = Path::new(&submission.original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        let desired_name = format!("{}_{}{}", submit_date.format("%Y-%m-%d"), owner.name, extension);

        let placed = self
            .storage
            .place_new(&self.receipts, submit_date, &desired_name, &submission.content)
            .await?;

        let receipt = self
            .receipts
            .insert(&NewReceipt {
                user_id: owner.id,
                receipt_date: submission.receipt_date,
                submit_date,
                activity: submission.activity.clone(),
                amount: submission.amount,
                path: placed.path,
                filename: placed.filename,
            })
            .await?;

        let mut warnings = Vec::new();
        for hook in &self.hooks {
            if let Err(e) = hook.post_submit(&receipt, owner).await {
                warn!("Post-submit hook failed for receipt {}: {}", receipt.id, e);
                warnings.push(format!("Failed to send notification: {}", e));
            }
        }

        Ok(WorkflowOutcome { receipt, warnings })
    }

    /// Apply a checked status transition and relocate the file accordingly
    async fn transition(
        &self,
        receipt: &Receipt,
        expected: &[ReceiptStatus],
        new_status: ReceiptStatus,
        comment: Option<&str>,
    ) -> AppResult<Receipt> {
        let new_dir = self
            .storage
            .stage_dir(Stage::for_status(new_status), receipt.submit_date)
            .display()
            .to_string();

        let transition = self
            .receipts
            .transition_status(receipt.id, expected, new_status, comment, &new_dir)
            .await?;

        self.storage
            .move_file(&transition.receipt.file.filename, &transition.previous_path, &new_dir)
            .await?;

        Ok(transition.receipt)
    }

    /// Approve a pending receipt; its file moves to `approved/<submit-date>/`
    pub async fn approve(&self, id: i64) -> AppResult<WorkflowOutcome> {
        let receipt = self
            .receipts
            .get(id)
            .await?
            .ok_or(AppError::NotFound("Receipt"))?;

        for hook in &self.hooks {
            hook.pre_approve(&receipt).await?;
        }

        let receipt = self
            .transition(&receipt, &[ReceiptStatus::Pending], ReceiptStatus::Handled, None)
            .await?;

        let mut warnings = Vec::new();
        for hook in &self.hooks {
            if let Err(e) = hook.post_approve(&receipt).await {
                warn!("Post-approve hook failed for receipt {}: {}", receipt.id, e);
                warnings.push(format!("Failed to send notification: {}", e));
            }
        }

        Ok(WorkflowOutcome { receipt, warnings })
    }

    /// Reject a pending receipt with a reason; its file moves to
    /// `rejected/<submit-date>/` and the submitter is notified
    pub async fn reject(&self, id: i64, reason: &str) -> AppResult<WorkflowOutcome> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation("A rejection reason is required".to_string()));
        }

        let receipt = self
            .receipts
            .get(id)
            .await?
            .ok_or(AppError::NotFound("Receipt"))?;

        for hook in &self.hooks {
            hook.pre_reject(&receipt).await?;
        }

        let receipt = self
            .transition(&receipt, &[ReceiptStatus::Pending], ReceiptStatus::Rejected, Some(reason))
            .await?;

        // Owner may have been deleted; the sentinel gets no mail.
        let owner = if receipt.user_id == SENTINEL_USER_ID {
            None
        } else {
            self.users.find_by_id(receipt.user_id).await?
        };

        let mut warnings = Vec::new();
        for hook in &self.hooks {
            if let Err(e) = hook.post_reject(&receipt, owner.as_ref()).await {
                warn!("Post-reject hook failed for receipt {}: {}", receipt.id, e);
                warnings.push(format!("Failed to send notification: {}", e));
            }
        }

        Ok(WorkflowOutcome { receipt, warnings })
    }

    /// Move a handled or rejected receipt back to pending review; its file
    /// returns to `submitted/<submit-date>/`. No hooks run.
    pub async fn resubmit(&self, id: i64) -> AppResult<WorkflowOutcome> {
        let receipt = self
            .receipts
            .get(id)
            .await?
            .ok_or(AppError::NotFound("Receipt"))?;

        let receipt = self
            .transition(
                &receipt,
                &[ReceiptStatus::Handled, ReceiptStatus::Rejected],
                ReceiptStatus::Pending,
                None,
            )
            .await?;

        Ok(WorkflowOutcome {
            receipt,
            warnings: Vec::new(),
        })
    }

    /// Archive a receipt; archiving an archived receipt is a no-op success
    pub async fn archive(&self, id: i64) -> AppResult<WorkflowOutcome> {
        if !self.receipts.set_archived(id).await? {
            return Err(AppError::NotFound("Receipt"));
        }

        let receipt = self
            .receipts
            .get(id)
            .await?
            .ok_or(AppError::NotFound("Receipt"))?;

        Ok(WorkflowOutcome {
            receipt,
            warnings: Vec::new(),
        })
    }
}
