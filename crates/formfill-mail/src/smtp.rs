//! SMTP submission via lettre
//!
//! Connects with STARTTLS, authenticates with the configured credentials and
//! sends one message per call.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, instrument};

use crate::types::{DeliveryReceipt, OutgoingEmail, ValidationError};
use crate::{MailConfig, Mailer};

/// SMTP email sender
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
}

impl SmtpMailer {
    /// Create a sender for the configured relay
    ///
    /// No connection is made until the first send.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::ConfigError(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            relay: format!("{}:{}", config.smtp_host, config.smtp_port),
        })
    }

    pub fn relay(&self) -> &str {
        &self.relay
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, email), fields(to = ?email.to, subject = %email.subject))]
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
        email.validate()?;
        let message = build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(relay = %self.relay, error = %e, "SMTP send failed");
            MailError::SendFailed(e.to_string())
        })?;

        let id = response.message().collect::<Vec<_>>().join(" ");
        info!(relay = %self.relay, response = %id, "Email sent successfully");

        Ok(DeliveryReceipt {
            id,
            accepted_at: Utc::now(),
            recipients: email.to.clone(),
        })
    }
}

/// Build a MIME message: a plain text part followed by the attachments
pub fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .subject(email.subject.clone());
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }

    let message = if email.attachments.is_empty() {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone())
    } else {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.text.clone()));
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::BuildError(format!("{}: {e}", attachment.content_type)))?;
            parts = parts.singlepart(
                MimeAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };

    message.map_err(|e| MailError::BuildError(e.to_string()))
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::Validation(ValidationError::InvalidEmail(address.to_string())))
}

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to build email: {0}")]
    BuildError(String),

    #[error("SMTP send failed: {0}")]
    SendFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
