//! Dashboard — read-only Axum server for watching the agent learn.
//!
//! Serves a small REST API and a self-contained HTML page.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::Html,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use routes::AppState;

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/status", get(routes::get_status))
        .route("/api/opponents", get(routes::get_opponents))
        .route("/api/sessions", get(routes::get_sessions))
        .route("/api/insights", get(routes::get_insights))
        .route("/health", get(routes::health))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
