//! Data models for the receipt service

pub mod clearance;
pub mod receipt;
pub mod user;

pub use clearance::Clearance;
pub use receipt::{NewReceipt, Receipt, ReceiptStatus, ReceiptSubmission, StoredFile};
pub use user::{NewUser, User};
