//! Application state shared across handlers

use crate::auth::JwtService;
use crate::directory::UserDirectory;
use crate::repositories::ReceiptRepository;
use crate::workflow::ReceiptWorkflow;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtService,
    pub directory: UserDirectory,
    pub workflow: ReceiptWorkflow,
    pub receipts: ReceiptRepository,
}
