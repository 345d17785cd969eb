//! HTTP surface: JSON endpoints under `/api/v1` plus a health check.

pub mod chat;
pub mod repos;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.config.cors_origin))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/repos", get(repos::list_repos))
        .route("/api/v1/repos/clone", post(repos::clone_repo))
        .route(
            "/api/v1/repos/{id}",
            get(repos::repo_info).delete(repos::delete_repo),
        )
        .route("/api/v1/repos/{id}/process", post(repos::process_repo))
        .route("/api/v1/repos/{id}/status", get(repos::repo_status))
        .route("/api/v1/repos/{id}/files", get(repos::file_stats))
        .route("/api/v1/repos/{id}/chat", post(chat::chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn allowed_origin(origin: &str) -> AllowOrigin {
    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {origin:?}: {e}");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    }
}

/// Run filesystem work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Background task failed: {e}")))
}
