//! HTTP tests for the formfill API

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use formfill_core::fixtures::{sample_form, single_marker_form, FixtureLine};
use formfill_core::{locate_markers, FormFiller, PdfForm};
use formfill_mail::{DeliveryReceipt, MailError, Mailer, OutgoingEmail};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::{app, log_filter};
use crate::models::UpdatePdfResponse;
use crate::state::AppState;
use crate::template::{TemplateError, TemplateSource};

struct StaticTemplate(Vec<u8>);

#[async_trait]
impl TemplateSource for StaticTemplate {
    async fn fetch(&self) -> Result<Vec<u8>, TemplateError> {
        Ok(self.0.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

struct FailingTemplate;

#[async_trait]
impl TemplateSource for FailingTemplate {
    async fn fetch(&self) -> Result<Vec<u8>, TemplateError> {
        Err(TemplateError::Io {
            path: "unreachable.pdf".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        })
    }

    fn location(&self) -> String {
        "unreachable.pdf".to_string()
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
        email.validate()?;
        self.sent.lock().unwrap().push(email.clone());
        Ok(DeliveryReceipt {
            id: "250 queued".to_string(),
            accepted_at: Default::default(),
            recipients: email.to.clone(),
        })
    }
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
        Err(MailError::SendFailed("connection refused".to_string()))
    }
}

fn state(
    template: Arc<dyn TemplateSource>,
    mailer: Arc<dyn Mailer>,
    output_dir: &Path,
    keep_output: bool,
) -> Arc<AppState> {
    Arc::new(AppState {
        template,
        mailer,
        filler: FormFiller::default(),
        output_dir: output_dir.to_path_buf(),
        keep_output,
        mail_from: "forms@example.com".to_string(),
        test_recipient: "ops@example.com".to_string(),
        mail_signature: "Front Desk".to_string(),
    })
}

fn server(state: Arc<AppState>) -> TestServer {
    TestServer::new(app(state)).unwrap()
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_root_greeting() {
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(Arc::new(FailingTemplate), mailer, dir.path(), false));

    let response = server.get("/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"message": "Hello from formfill"}));
}

#[tokio::test]
async fn test_status_reports_service() {
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(Arc::new(FailingTemplate), mailer, dir.path(), false));

    let response = server.get("/status/").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "formfill-api");
}

#[tokio::test]
async fn test_update_pdf_fills_and_emails() {
    let template = single_marker_form();
    let marker = locate_markers(&template, "answer").unwrap()[0];

    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(
        Arc::new(StaticTemplate(template)),
        mailer.clone(),
        dir.path(),
        false,
    ));

    let response = server
        .post("/update_pdf/")
        .json(&json!({"answers": ["X"], "recipient": "a@b.com"}))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<UpdatePdfResponse>(),
        UpdatePdfResponse {
            message: "PDF updated successfully".to_string(),
            markers_found: 1,
            answers_placed: 1,
        }
    );

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["a@b.com".to_string()]);
    assert_eq!(sent[0].subject, "Patient Information");

    let attachment = &sent[0].attachments[0];
    assert!(attachment.filename.starts_with("filled_"));
    assert!(attachment.filename.ends_with(".pdf"));

    let filled = PdfForm::from_bytes(&attachment.content).unwrap();
    let page = filled.page_text(0).unwrap();
    let x = page
        .lines
        .iter()
        .flat_map(|line| &line.glyphs)
        .find(|glyph| glyph.text == "X")
        .expect("answer drawn");
    assert!((x.rect.x0 - (marker.rect.x1 + 20.0)).abs() < 1e-3);
    assert!((x.rect.y0 + 0.8 * 11.0 - marker.rect.y0).abs() < 1e-3);

    // temp output removed once the request completes
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_update_pdf_keeps_unique_outputs() {
    let template = sample_form(&[vec![
        FixtureLine::new(72.0, 700.0, "First answer"),
        FixtureLine::new(72.0, 650.0, "Second answer"),
    ]]);
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(
        Arc::new(StaticTemplate(template)),
        mailer.clone(),
        dir.path(),
        true,
    ));

    for _ in 0..2 {
        server
            .post("/update_pdf/")
            .json(&json!({"answers": ["only one"], "recipient": "a@b.com"}))
            .await
            .assert_status_ok();
    }

    // same-second requests never share a filename
    assert_eq!(files_in(dir.path()), 2);
    let names: Vec<String> = mailer.sent().iter().map(|m| m.attachments[0].filename.clone()).collect();
    assert_ne!(names[0], names[1]);
}

#[tokio::test]
async fn test_update_pdf_reports_blank_markers() {
    let template = sample_form(&[vec![
        FixtureLine::new(72.0, 700.0, "Name answer"),
        FixtureLine::new(72.0, 650.0, "Age answer"),
    ]]);
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(Arc::new(StaticTemplate(template)), mailer, dir.path(), false));

    let response = server
        .post("/update_pdf/")
        .json(&json!({"answers": ["Jane", "41", "surplus"], "recipient": "a@b.com"}))
        .await;
    response.assert_status_ok();
    let body = response.json::<UpdatePdfResponse>();
    assert_eq!(body.markers_found, 2);
    assert_eq!(body.answers_placed, 2);
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(state(
        Arc::new(StaticTemplate(single_marker_form())),
        Arc::new(FailingMailer),
        dir.path(),
        false,
    ));

    let response = server
        .post("/update_pdf/")
        .json(&json!({"answers": ["X"], "recipient": "a@b.com"}))
        .await;
    response.assert_status_ok();
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_template_failure_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(Arc::new(FailingTemplate), mailer.clone(), dir.path(), false));

    let response = server
        .post("/update_pdf/")
        .json(&json!({"answers": ["X"], "recipient": "a@b.com"}))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let json = response.json::<Value>();
    assert_eq!(json["status"], 502);
    assert!(json["error"].as_str().unwrap().contains("unreachable.pdf"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(
        Arc::new(StaticTemplate(single_marker_form())),
        mailer.clone(),
        dir.path(),
        false,
    ));

    let response = server
        .post("/update_pdf/")
        .json(&json!({"answers": "not a list", "recipient": "a@b.com"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_send_test_email() {
    let dir = tempfile::tempdir().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let server = server(state(Arc::new(FailingTemplate), mailer.clone(), dir.path(), false));

    let response = server.get("/send_test_email/").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({"message": "Test email sent to ops@example.com"})
    );
    assert_eq!(mailer.sent()[0].to, vec!["ops@example.com".to_string()]);
}

#[tokio::test]
async fn test_send_test_email_failure_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(state(
        Arc::new(FailingTemplate),
        Arc::new(FailingMailer),
        dir.path(),
        false,
    ));

    let response = server.get("/send_test_email/").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let json = response.json::<Value>();
    assert!(json["error"].as_str().unwrap().contains("connection refused"));
}

#[test]
fn test_rust_log_overrides_default_levels() {
    let filter = log_filter(false, Some("formfill_core=trace")).unwrap().to_string();
    assert!(filter.contains("formfill_core=trace"));
    assert!(!filter.contains("formfill_core=info"));
    assert!(!filter.contains("tower_http"));
}

#[test]
fn test_default_log_levels_without_rust_log() {
    let quiet = log_filter(false, None).unwrap().to_string();
    assert!(quiet.contains("formfill_core=info"));
    assert!(quiet.contains("tower_http=debug"));

    let verbose = log_filter(true, Some("  ")).unwrap().to_string();
    assert!(verbose.contains("formfill_api=debug"));
}

mod proptests {
    use super::*;
    use crate::models::UpdatePdfRequest;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn update_request_preserves_answer_order(answers in prop::collection::vec(".{0,40}", 0..10)) {
            let body = json!({"answers": answers, "recipient": "a@b.com"});
            let req: UpdatePdfRequest = serde_json::from_value(body).unwrap();
            prop_assert_eq!(req.answers, answers);
        }
    }
}
