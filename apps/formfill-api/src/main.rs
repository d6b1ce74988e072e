//! Formfill API Server
//!
//! Fills a fixed PDF form template with submitted answers and emails the
//! filled document. Each answer is drawn next to an occurrence of the marker
//! word in the template, in document order.
//!
//! - `POST /update_pdf/` fill the template and email it to a recipient
//! - `GET /status/` health check
//! - `GET /send_test_email/` verify the SMTP configuration

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod handlers;
mod models;
mod state;
mod template;
#[cfg(test)]
mod tests;

use config::Config;
use state::AppState;

/// Build the router with all routes and middleware
pub fn app(state: Arc<AppState>) -> Router {
    // CORS configuration for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/status/", get(handlers::status))
        .route("/update_pdf/", post(handlers::update_pdf))
        .route("/send_test_email/", get(handlers::send_test_email))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Log directives used when `RUST_LOG` is unset
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("formfill_api={level},formfill_core={level},formfill_mail={level},tower_http=debug")
}

pub fn log_filter(
    verbose: bool,
    rust_log: Option<&str>,
) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match rust_log.map(str::trim).filter(|directives| !directives.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_new(default_directives(verbose)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::parse();

    // Initialize logging; RUST_LOG takes precedence over the built-in levels
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::registry()
        .with(log_filter(config.verbose, rust_log.as_deref())?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Initializing formfill API...");
    let state = Arc::new(AppState::new(&config)?);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting formfill API on http://{}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
