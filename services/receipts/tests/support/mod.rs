//! Shared fixtures for integration tests

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use receipts::models::{Clearance, NewUser, User};
use receipts::notify::{Mailer, NotificationError};
use receipts::repositories::UserRepository;

/// A fresh file-backed database with the schema applied
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = common::database::DatabaseConfig {
        database_url: format!("sqlite://{}", dir.path().join("test.db").display()),
        max_connections: 5,
    };
    let pool = common::database::init_pool(&config)
        .await
        .expect("Failed to create pool");
    receipts::schema::init_db(&pool)
        .await
        .expect("Failed to initialize schema");
    (pool, dir)
}

/// One captured outbound email
#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that records every send
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<SentMail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Mailer whose transport always fails
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("connection refused".to_string()))
    }
}

/// Insert a user with a known password, bypassing the directory
pub async fn seed_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
    clearance: Clearance,
) -> User {
    let users = UserRepository::new(pool.clone());
    let hash = UserRepository::hash_password(password).expect("Failed to hash password");
    let user = users
        .create(
            &NewUser {
                name: name.to_string(),
                email: email.to_string(),
            },
            &hash,
            clearance,
        )
        .await
        .expect("Failed to seed user");
    // Seeded accounts are ready to use without a forced password change.
    users
        .update_password(user.id, &hash, false)
        .await
        .expect("Failed to clear password flag");
    User {
        needs_password_change: false,
        ..user
    }
}
