//! Database repositories

pub mod receipt;
pub mod user;

pub use receipt::ReceiptRepository;
pub use user::UserRepository;
