//! Delivery of filled forms over SMTP
//!
//! Mail goes out through an authenticated submission server (STARTTLS on
//! port 587 by default). Callers talk to the [`Mailer`] trait so tests and
//! alternative transports can stand in for [`SmtpMailer`].
//!
//! ## Usage
//!
//! ```no_run
//! use formfill_mail::{EmailTemplate, MailConfig, Mailer, SmtpMailer};
//!
//! # async fn run() -> Result<(), formfill_mail::MailError> {
//! let config = MailConfig::new("postmaster@example.com", "secret");
//! let mailer = SmtpMailer::new(&config)?;
//! let email = EmailTemplate::TestMessage { recipient: "ops@example.com".into() }.to_email(&config.from);
//! mailer.send(&email).await?;
//! # Ok(())
//! # }
//! ```

pub mod smtp;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use smtp::{build_message, MailError, SmtpMailer};
pub use types::{
    is_valid_email, Attachment, DeliveryReceipt, EmailTemplate, OutgoingEmail, ValidationError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sends outgoing email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, MailError>;
}

/// SMTP connection settings
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,

    /// Submission port; STARTTLS is required
    pub smtp_port: u16,

    pub username: String,
    pub password: String,

    /// Sender address; defaults to the username
    pub from: String,

    /// Connection and command timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MailConfig {
    pub const DEFAULT_HOST: &'static str = "smtp.mailgun.org";
    pub const DEFAULT_PORT: u16 = 587;

    pub fn new(username: &str, password: &str) -> Self {
        Self {
            smtp_host: Self::DEFAULT_HOST.to_string(),
            smtp_port: Self::DEFAULT_PORT,
            username: username.to_string(),
            password: password.to_string(),
            from: username.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}
