//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use formfill_mail::MailConfig;

/// Command-line arguments for the formfill server
///
/// Every option can also be set through the environment or a `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(name = "formfill-api")]
#[command(about = "Fill a PDF form template with answers and email the result")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Form template: an http(s) URL or a local path
    #[arg(long = "template", env = "FORM_TEMPLATE_URL")]
    pub template: String,

    /// Directory for filled PDFs
    #[arg(long, env = "FILLED_PDF_DIR", default_value = "filled_pdfs")]
    pub output_dir: PathBuf,

    /// Keep filled PDFs after the request completes
    #[arg(long, env = "KEEP_FILLED_PDFS")]
    pub keep_output: bool,

    /// Marker word that anchors each answer
    #[arg(long, env = "FORM_MARKER", default_value = formfill_core::DEFAULT_MARKER)]
    pub marker: String,

    /// Template download timeout in seconds
    #[arg(long, env = "TEMPLATE_FETCH_TIMEOUT_SECS", default_value = "30")]
    pub fetch_timeout_secs: u64,

    /// SMTP submission host
    #[arg(long, env = "SMTP_HOST", default_value = MailConfig::DEFAULT_HOST)]
    pub smtp_host: String,

    /// SMTP submission port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: String,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: String,

    /// Sender address, defaults to the SMTP username
    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Recipient of /send_test_email/, defaults to the sender
    #[arg(long, env = "TEST_EMAIL_RECIPIENT")]
    pub test_recipient: Option<String>,

    /// Closing line of the filled-form email
    #[arg(long, env = "MAIL_SIGNATURE", default_value = "Formfill")]
    pub mail_signature: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn mail(&self) -> MailConfig {
        let mut mail = MailConfig::new(&self.smtp_username, &self.smtp_password);
        mail.smtp_host = self.smtp_host.clone();
        mail.smtp_port = self.smtp_port;
        if let Some(from) = &self.mail_from {
            mail.from = from.clone();
        }
        mail
    }

    pub fn test_recipient(&self) -> String {
        self.test_recipient
            .clone()
            .unwrap_or_else(|| self.mail().from)
    }
}
