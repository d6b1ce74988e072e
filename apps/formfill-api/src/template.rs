//! Where the blank form template comes from

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to download template: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Provides the template bytes for each request
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, TemplateError>;

    /// Human readable location, for logs
    fn location(&self) -> String;
}

/// Template downloaded over HTTP(S) on every request
pub struct HttpTemplate {
    client: reqwest::Client,
    url: String,
}

impl HttpTemplate {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl TemplateSource for HttpTemplate {
    async fn fetch(&self) -> Result<Vec<u8>, TemplateError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(url = %self.url, size = bytes.len(), "Downloaded template");
        Ok(bytes.to_vec())
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

/// Template read from the local filesystem on every request
pub struct FileTemplate {
    path: PathBuf,
}

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TemplateSource for FileTemplate {
    async fn fetch(&self) -> Result<Vec<u8>, TemplateError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| TemplateError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a source by location: URLs are downloaded, anything else is a path
pub fn template_source(location: &str, client: reqwest::Client) -> Arc<dyn TemplateSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpTemplate::new(client, location))
    } else {
        Arc::new(FileTemplate::new(location))
    }
}
