//! Application state for the formfill API

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use formfill_core::{FormFiller, MarkerLocator};
use formfill_mail::{Mailer, SmtpMailer};

use crate::config::Config;
use crate::template::{template_source, TemplateSource};

/// Shared, read-only state handed to every request
pub struct AppState {
    pub template: Arc<dyn TemplateSource>,
    pub mailer: Arc<dyn Mailer>,
    pub filler: FormFiller,
    /// Directory filled PDFs are written to
    pub output_dir: PathBuf,
    pub keep_output: bool,
    pub mail_from: String,
    pub test_recipient: String,
    pub mail_signature: String,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;
        let template = template_source(&config.template, client);
        tracing::info!("Form template: {}", template.location());

        let mail = config.mail();
        let mailer = SmtpMailer::new(&mail)?;
        tracing::info!("SMTP relay: {}", mailer.relay());

        let filler = FormFiller::new(MarkerLocator::new(&config.marker)?);

        std::fs::create_dir_all(&config.output_dir)?;

        Ok(Self {
            template,
            mailer: Arc::new(mailer),
            filler,
            output_dir: config.output_dir.clone(),
            keep_output: config.keep_output,
            test_recipient: config.test_recipient(),
            mail_from: mail.from,
            mail_signature: config.mail_signature.clone(),
        })
    }
}
