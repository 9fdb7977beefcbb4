//! Outbound email. Missing SMTP configuration is a reported failure, never a
//! panic or a crash: callers always get an outcome they can surface.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub success: bool,
    pub message: String,
}

impl NotificationOutcome {
    fn sent(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> NotificationOutcome;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// Reads SMTP_HOST, SMTP_USER, SMTP_PASSWORD and SMTP_FROM; all four are
    /// required for the notifier to be configured.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            host: std::env::var("SMTP_HOST").ok()?,
            user: std::env::var("SMTP_USER").ok()?,
            password: std::env::var("SMTP_PASSWORD").ok()?,
            from: std::env::var("SMTP_FROM").ok()?,
        })
    }
}

pub struct SmtpNotifier {
    config: Option<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        let config = SmtpConfig::from_env();
        if config.is_none() {
            warn!("SMTP is not configured; email delivery will report failure");
        }
        Self::new(config)
    }

    async fn deliver(
        config: &SmtpConfig,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(config.from.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();

        mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for SmtpNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> NotificationOutcome {
        let Some(config) = &self.config else {
            return NotificationOutcome::failed(
                "Email is not configured: set SMTP_HOST, SMTP_USER, SMTP_PASSWORD and SMTP_FROM",
            );
        };

        match Self::deliver(config, recipient, subject, body).await {
            Ok(()) => {
                info!("Email sent to {}", recipient);
                NotificationOutcome::sent(format!("Email sent to {}", recipient))
            }
            Err(e) => {
                warn!("Failed to send email to {}: {}", recipient, e);
                NotificationOutcome::failed(format!("Failed to send email: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_notifier_reports_failure_without_erroring() {
        let notifier = SmtpNotifier::new(None);
        let outcome = notifier.send("someone@example.com", "hello", "body").await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("not configured"));
    }
}
