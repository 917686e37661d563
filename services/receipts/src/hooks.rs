//! Workflow extension points
//!
//! The workflow engine invokes hooks synchronously at defined points.
//! Pre-hooks run before the transition is applied and may veto it by
//! returning an error; post-hooks run after the transition committed and
//! cannot undo it — their failures become caller-visible warnings.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Receipt, ReceiptSubmission, User};
use crate::notify::{Mailer, NotificationError};

/// Receipt workflow hook
///
/// Every method is a no-op by default; implementations override the points
/// they care about.
#[async_trait]
pub trait ReceiptHook: Send + Sync {
    /// Runs after submission validation, before the file is placed
    async fn pre_submit(&self, _submission: &ReceiptSubmission, _owner: &User) -> AppResult<()> {
        Ok(())
    }

    /// Runs after the receipt has been committed
    async fn post_submit(&self, _receipt: &Receipt, _owner: &User) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn pre_approve(&self, _receipt: &Receipt) -> AppResult<()> {
        Ok(())
    }

    async fn post_approve(&self, _receipt: &Receipt) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn pre_reject(&self, _receipt: &Receipt) -> AppResult<()> {
        Ok(())
    }

    /// Runs after a rejection committed; `owner` is absent when the
    /// submitter has since been deleted
    async fn post_reject(
        &self,
        _receipt: &Receipt,
        _owner: Option<&User>,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Default hook set: emails on submission and rejection
pub struct NotificationHooks {
    mailer: Arc<dyn Mailer>,
    /// Recipient of new-submission notices, typically the finance inbox
    submission_recipient: Option<String>,
    base_url: String,
}

impl NotificationHooks {
    pub fn new(mailer: Arc<dyn Mailer>, submission_recipient: Option<String>, base_url: String) -> Self {
        Self {
            mailer,
            submission_recipient,
            base_url,
        }
    }

    fn receipt_url(&self, receipt: &Receipt) -> String {
        format!("{}/receipts/{}", self.base_url.trim_end_matches('/'), receipt.id)
    }
}

#[async_trait]
impl ReceiptHook for NotificationHooks {
    async fn post_submit(&self, receipt: &Receipt, owner: &User) -> Result<(), NotificationError> {
        let Some(recipient) = &self.submission_recipient else {
            return Ok(());
        };

        self.mailer
            .send(
                recipient,
                "New receipt submission",
                &format!(
                    "Hello,\n\nA new receipt has been submitted by {}:\n\n{}\n",
                    owner.name,
                    self.receipt_url(receipt)
                ),
            )
            .await
    }

    async fn post_reject(
        &self,
        receipt: &Receipt,
        owner: Option<&User>,
    ) -> Result<(), NotificationError> {
        let Some(owner) = owner else {
            return Ok(());
        };

        self.mailer
            .send(
                &owner.email,
                "Receipt rejected",
                &format!(
                    "Hello,\n\nOne of your receipts has been rejected. For details, see {}.\n",
                    self.receipt_url(receipt)
                ),
            )
            .await
    }
}
