//! Receipt, receipt status, and stored file models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Workflow status of a receipt
///
/// The discriminants are the persisted status ids. Their numeric order is
/// load-bearing: listings sort ascending by status id so pending receipts
/// come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Pending = 10,
    Handled = 80,
    Rejected = 90,
}

impl ReceiptStatus {
    /// All statuses, in persisted id order
    pub const ALL: [ReceiptStatus; 3] = [
        ReceiptStatus::Pending,
        ReceiptStatus::Handled,
        ReceiptStatus::Rejected,
    ];

    /// The persisted status id
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Resolve a persisted status id
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.id() == id)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "Pending",
            ReceiptStatus::Handled => "Handled",
            ReceiptStatus::Rejected => "Rejected",
        }
    }

    /// Highlight color used by clients when rendering receipt listings
    pub fn display_color(self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "yellow",
            ReceiptStatus::Handled => "lightgreen",
            ReceiptStatus::Rejected => "red",
        }
    }
}

/// An uploaded receipt document on disk
///
/// `filename` is unique across the whole store; `path` is the directory the
/// file currently lives in and changes whenever the receipt moves through
/// the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: i64,
    pub path: String,
    pub filename: String,
}

/// Receipt entity with its stored file
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: i64,
    pub user_id: i64,
    pub receipt_date: NaiveDate,
    pub submit_date: NaiveDate,
    pub activity: String,
    /// Amount in minor currency units (pennies)
    pub amount: i64,
    pub status: ReceiptStatus,
    pub status_comment: Option<String>,
    pub archived: bool,
    pub file: StoredFile,
}

/// Receipt insertion payload, linked to an already-placed file
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub user_id: i64,
    pub receipt_date: NaiveDate,
    pub submit_date: NaiveDate,
    pub activity: String,
    pub amount: i64,
    pub path: String,
    pub filename: String,
}

/// A validated submission handed to the workflow engine
#[derive(Debug, Clone)]
pub struct ReceiptSubmission {
    pub receipt_date: NaiveDate,
    pub activity: String,
    /// Amount in minor currency units (pennies)
    pub amount: i64,
    /// Original name of the uploaded file, used for its extension
    pub original_filename: String,
    pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ids() {
        assert_eq!(ReceiptStatus::Pending.id(), 10);
        assert_eq!(ReceiptStatus::Handled.id(), 80);
        assert_eq!(ReceiptStatus::Rejected.id(), 90);
    }

    #[test]
    fn test_status_from_id() {
        assert_eq!(ReceiptStatus::from_id(10), Some(ReceiptStatus::Pending));
        assert_eq!(ReceiptStatus::from_id(42), None);
    }
}
