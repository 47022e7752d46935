//! HTTP server for rmad

use crate::engine::WorkflowService;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<WorkflowService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Assemble the full route tree. Tests drive this router directly.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::case_routes())
        .merge(routes::workflow_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until shutdown
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
