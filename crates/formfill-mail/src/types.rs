//! Email types, validation and message templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email ready to hand to a [`crate::Mailer`]
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    /// Sender address, optionally as `Name <addr>`
    pub from: String,

    /// Recipient addresses
    pub to: Vec<String>,

    pub subject: String,

    /// Plain text body
    pub text: String,

    pub attachments: Vec<Attachment>,
}

impl OutgoingEmail {
    /// Create a plain text email to a single recipient
    pub fn simple(from: &str, to: &str, subject: &str, text: &str) -> Self {
        Self {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text: text.to_string(),
            attachments: vec![],
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Validate the email
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Check sender
        if self.from.is_empty() {
            return Err(ValidationError::MissingField("from"));
        }
        if !is_valid_email(&self.from) {
            return Err(ValidationError::InvalidEmail(self.from.clone()));
        }

        // Check recipients
        if self.to.is_empty() {
            return Err(ValidationError::MissingField("to"));
        }
        for email in &self.to {
            if !is_valid_email(email) {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }

        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }

        for attachment in &self.attachments {
            if attachment.content.is_empty() {
                return Err(ValidationError::EmptyAttachment(attachment.filename.clone()));
            }
        }

        Ok(())
    }
}

/// Email attachment
#[derive(Clone, PartialEq)]
pub struct Attachment {
    /// Filename shown to the recipient
    pub filename: String,

    /// Raw content
    pub content: Vec<u8>,

    /// MIME type (e.g., "application/pdf")
    pub content_type: String,
}

impl Attachment {
    pub fn pdf(filename: &str, content: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            content,
            content_type: "application/pdf".to_string(),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Outcome of a successful send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryReceipt {
    /// Server response or message identifier
    pub id: String,

    /// When the server accepted the message
    pub accepted_at: DateTime<Utc>,

    pub recipients: Vec<String>,
}

/// Validation error
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Attachment {0} is empty")]
    EmptyAttachment(String),
}

/// Check if email address is valid, accepting the `Name <addr>` form
pub fn is_valid_email(email: &str) -> bool {
    email_address::EmailAddress::is_valid(bare_address(email))
}

/// The address part of `Name <addr>`, or the input unchanged
pub(crate) fn bare_address(email: &str) -> &str {
    match (email.find('<'), email.rfind('>')) {
        (Some(start), Some(end)) if start < end => email[start + 1..end].trim(),
        _ => email.trim(),
    }
}

/// Messages this service sends
#[derive(Debug, Clone)]
pub enum EmailTemplate {
    /// A filled form sent to the submitter's recipient
    FilledForm {
        recipient: String,
        filename: String,
        pdf: Vec<u8>,
        signature: String,
    },

    /// Connectivity check for the SMTP configuration
    TestMessage { recipient: String },
}

impl EmailTemplate {
    /// Convert template to an outgoing email from `from`
    pub fn to_email(&self, from: &str) -> OutgoingEmail {
        match self {
            EmailTemplate::FilledForm {
                recipient,
                filename,
                pdf,
                signature,
            } => {
                let text = format!(
                    "Hello,\n\n\
                    Please find the attached PDF document.\n\n\
                    Best regards,\n\
                    {signature}"
                );
                OutgoingEmail::simple(from, recipient, "Patient Information", &text)
                    .with_attachment(Attachment::pdf(filename, pdf.clone()))
            }

            EmailTemplate::TestMessage { recipient } => OutgoingEmail::simple(
                from,
                recipient,
                "Test Email",
                "This is a test email sent from the form filling service.",
            ),
        }
    }
}
