use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lib_cleaner::export::{render_base64_subscription, render_subscription};
use lib_cleaner::Pipeline;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_graceful::ShutdownGuard;
use tracing::{error, info};

use crate::cleaner_logic::scheduler::run_logged;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Triggered runs are spawned on this guard so shutdown waits for them.
    pub guard: ShutdownGuard,
}

/// Rendering a subscription failed.
#[derive(Debug)]
pub struct AppError(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Subscription render failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error_type": "RenderError", "message": self.0 })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/trigger", post(trigger_handler))
        .route("/sub", get(subscription_handler))
        .route("/sub/base64", get(subscription_base64_handler))
        .with_state(state)
}

pub async fn run(state: AppState, port: u16) -> anyhow::Result<()> {
    let guard = state.guard.clone();
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            guard.cancelled().await;
            info!("HTTP API shutting down.");
        })
        .await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.pipeline.working_set();
    Json(json!({
        "status": "running",
        "last_update": snapshot.last_update_label(),
        "pool_size": snapshot.len(),
        "run_in_progress": state.pipeline.is_running(),
    }))
}

async fn trigger_handler(State(state): State<AppState>) -> Json<Value> {
    let pipeline = Arc::clone(&state.pipeline);
    state.guard.spawn_task(async move {
        run_logged(&pipeline, "trigger").await;
    });
    Json(json!({ "message": "Update triggered in background" }))
}

async fn subscription_handler(State(state): State<AppState>) -> Result<String, AppError> {
    render_subscription(&state.pipeline.working_set()).map_err(|e| AppError(e.to_string()))
}

async fn subscription_base64_handler(State(state): State<AppState>) -> Result<String, AppError> {
    render_base64_subscription(&state.pipeline.working_set()).map_err(|e| AppError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lib_cleaner::PipelineSettings;
    use tokio_graceful::Shutdown;

    use super::*;

    fn state(shutdown: &Shutdown) -> AppState {
        let mut settings = PipelineSettings::default();
        // Nothing listens here; a triggered run fails fast and harmlessly.
        settings.sources.urls = vec!["http://127.0.0.1:1/sub.yaml".to_string()];
        settings.sources.request_timeout = Duration::from_millis(200);
        AppState {
            pipeline: Arc::new(Pipeline::new(settings).unwrap()),
            guard: shutdown.guard(),
        }
    }

    #[tokio::test]
    async fn health_reports_never_before_first_run() {
        let shutdown = Shutdown::no_signal();
        let Json(body) = health_handler(State(state(&shutdown))).await;

        assert_eq!(body["status"], "running");
        assert_eq!(body["last_update"], "Never");
        assert_eq!(body["pool_size"], 0);
        assert_eq!(body["run_in_progress"], false);
    }

    #[tokio::test]
    async fn empty_pool_still_serves_documents() {
        let shutdown = Shutdown::no_signal();
        let app = state(&shutdown);

        let doc = subscription_handler(State(app.clone())).await.unwrap();
        assert!(doc.contains("MATCH,Proxy"));
        let encoded = subscription_base64_handler(State(app)).await.unwrap();
        assert!(!encoded.is_empty());
    }

    #[tokio::test]
    async fn trigger_answers_immediately() {
        let shutdown = Shutdown::no_signal();
        let app = state(&shutdown);

        let Json(body) = trigger_handler(State(app.clone())).await;
        assert_eq!(body["message"], "Update triggered in background");
    }
}
