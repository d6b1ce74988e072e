//! HTTP handlers for the formfill API

use std::sync::Arc;

use axum::{extract::State, Json};
use formfill_mail::EmailTemplate;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Handler: GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from formfill".to_string(),
    })
}

/// Handler: GET /status/
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        service: "formfill-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /update_pdf/
///
/// Fetches the template, fills it with the answers and emails the result.
/// Mail failures are logged and do not change the response.
pub async fn update_pdf(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePdfRequest>,
) -> Result<Json<UpdatePdfResponse>, ApiError> {
    let template = state.template.fetch().await?;

    let filler = state.filler.clone();
    let output_dir = state.output_dir.clone();
    let answers = req.answers;
    let (output, report) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let mut filled = filler.fill(&template, &answers)?;
        let output = tempfile::Builder::new()
            .prefix("filled_")
            .suffix(".pdf")
            .tempfile_in(&output_dir)?;
        filled.save(output.path())?;
        Ok((output, filled.report()))
    })
    .await??;

    let filename = output
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "filled.pdf".to_string());
    info!(
        file = %filename,
        markers_found = report.markers_found,
        answers_placed = report.answers_placed,
        "Filled form written"
    );

    let pdf = tokio::fs::read(output.path()).await?;
    let email = EmailTemplate::FilledForm {
        recipient: req.recipient.clone(),
        filename: filename.clone(),
        pdf,
        signature: state.mail_signature.clone(),
    }
    .to_email(&state.mail_from);

    match state.mailer.send(&email).await {
        Ok(receipt) => info!(recipient = %req.recipient, id = %receipt.id, "Filled form emailed"),
        Err(e) => error!(recipient = %req.recipient, error = %e, "Failed to email filled form"),
    }

    if state.keep_output {
        if let Err(e) = output.keep() {
            warn!(file = %filename, error = %e, "Failed to keep filled form");
        }
    } else if let Err(e) = output.close() {
        warn!(file = %filename, error = %e, "Failed to remove filled form");
    }

    Ok(Json(UpdatePdfResponse {
        message: "PDF updated successfully".to_string(),
        markers_found: report.markers_found,
        answers_placed: report.answers_placed,
    }))
}

/// Handler: GET /send_test_email/
pub async fn send_test_email(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = EmailTemplate::TestMessage {
        recipient: state.test_recipient.clone(),
    }
    .to_email(&state.mail_from);

    state.mailer.send(&email).await?;
    info!(recipient = %state.test_recipient, "Test email sent");

    Ok(Json(MessageResponse {
        message: format!("Test email sent to {}", state.test_recipient),
    }))
}
