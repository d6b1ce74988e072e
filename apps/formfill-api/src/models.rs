//! Request and response bodies

use serde::{Deserialize, Serialize};

/// Body of `POST /update_pdf/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePdfRequest {
    /// Answers in marker order
    pub answers: Vec<String>,
    /// Where the filled PDF is emailed
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatePdfResponse {
    pub message: String,
    pub markers_found: usize,
    pub answers_placed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}
