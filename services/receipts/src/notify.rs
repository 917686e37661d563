//! Notification gateway
//!
//! Outbound email on workflow transitions. The gateway never silently drops
//! a message: every failure is logged and signalled to the caller, who
//! usually downgrades it to a user-visible warning.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{error, info};

use crate::config::SmtpConfig;

/// Mail transport failure
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid mail address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("No SMTP host configured")]
    NotConfigured,
}

/// Outbound mail gateway
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str)
    -> Result<(), NotificationError>;
}

/// SMTP-backed mailer over lettre's async transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl SmtpMailer {
    /// Create a mailer from SMTP configuration
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(
                self.sender
                    .parse()
                    .map_err(|_| NotificationError::Address(self.sender.clone()))?,
            )
            .to(recipient
                .parse()
                .map_err(|_| NotificationError::Address(recipient.to_string()))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotificationError::Message(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            error!("Failed to send email to {}: {}", recipient, e);
            NotificationError::Transport(e.to_string())
        })?;

        info!("Sent email to {}: {}", recipient, subject);
        Ok(())
    }
}

/// Mailer used when no SMTP host is configured
///
/// Logs the attempt and reports failure so callers surface a warning
/// instead of pretending the mail went out.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<(), NotificationError> {
        error!(
            "Dropping email to {} ({}): no SMTP host configured",
            recipient, subject
        );
        Err(NotificationError::NotConfigured)
    }
}
