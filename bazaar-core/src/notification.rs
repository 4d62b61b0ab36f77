use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// An outbound email handed to the mail collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<Masked<String>>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into_iter().map(Masked).collect(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().map(|r| r.expose().as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Transport unavailable: {0}")]
    Transport(String),
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Delivery side of the notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Writes messages to the structured log instead of a mail transport.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if message.to.is_empty() {
            return Err(NotifyError::Rejected("message has no recipients".into()));
        }

        tracing::info!(
            recipients = message.to.len(),
            subject = %message.subject,
            "Email dispatched:\n{}",
            message.body
        );
        Ok(())
    }
}
