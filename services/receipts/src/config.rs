//! Application configuration loaded from environment variables

use anyhow::Result;
use std::env;
use std::path::PathBuf;

/// SMTP settings for outbound notifications
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Sender address on outgoing mail
    pub sender: String,
}

impl SmtpConfig {
    /// Read SMTP settings from the environment; `None` when no host is
    /// configured (notifications are then logged and dropped)
    pub fn from_env() -> Option<Self> {
        let host = env::var("RECEIPTS_SMTP_HOST").ok()?;
        Some(Self {
            host,
            username: env::var("RECEIPTS_SMTP_USERNAME").unwrap_or_default(),
            password: env::var("RECEIPTS_SMTP_PASSWORD").unwrap_or_default(),
            sender: env::var("RECEIPTS_EMAIL_SENDER").unwrap_or_default(),
        })
    }
}

/// Bootstrap admin account, seeded when the users table has no admin yet
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// External base URL used in notification links
    pub base_url: String,
    /// Root directory of the receipt file store
    pub storage_root: PathBuf,
    /// Recipient of new-submission notifications
    pub submission_recipient: Option<String>,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// Bearer token lifetime in seconds
    pub token_expiry: u64,
    pub smtp: Option<SmtpConfig>,
    pub admin: Option<AdminBootstrap>,
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("RECEIPTS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let base_url =
            env::var("RECEIPTS_BASE_URL").unwrap_or_else(|_| format!("http://{}", bind_addr));
        let storage_root = env::var("RECEIPTS_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("instance/receipts"));
        let submission_recipient = env::var("RECEIPTS_EMAIL_RECEIPT_RECIPIENT").ok();

        let jwt_secret = env::var("RECEIPTS_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("RECEIPTS_JWT_SECRET environment variable not set"))?;

        let token_expiry = env::var("RECEIPTS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(28800); // 8 hours

        let admin = match (
            env::var("RECEIPTS_ADMIN_USER_EMAIL"),
            env::var("RECEIPTS_ADMIN_USER_NAME"),
            env::var("RECEIPTS_ADMIN_USER_PASSWORD"),
        ) {
            (Ok(email), Ok(name), Ok(password)) => Some(AdminBootstrap {
                email,
                name,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            base_url,
            storage_root,
            submission_recipient,
            jwt_secret,
            token_expiry,
            smtp: SmtpConfig::from_env(),
            admin,
        })
    }
}
