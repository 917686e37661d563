//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Clearance;

/// Id of the placeholder account that owns receipts whose original
/// submitter has been deleted. Protected from every mutation.
pub const SENTINEL_USER_ID: i64 = 0;

/// User entity
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub needs_password_change: bool,
    pub clearance: Clearance,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Whether this id belongs to the sentinel or another protected slot
    pub fn is_protected_id(id: i64) -> bool {
        id <= SENTINEL_USER_ID
    }
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}
