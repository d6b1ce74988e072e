use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormFillError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {0} not found")]
    PageNotFound(usize),

    #[error("Malformed content on page {page}: {reason}")]
    ContentError { page: usize, reason: String },

    #[error("Failed to write PDF: {0}")]
    WriteError(String),

    #[error("Marker word must not be empty")]
    EmptyMarker,
}
