use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::models::{ChatRequest, ChatResponse, RepoId};
use crate::state::AppState;

/// POST /api/v1/repos/{id}/chat - Answer a question from the repo's collection
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    tracing::info!("Chat request for {repo_id}");
    let resp = state.query.ask(&repo_id, &req.question).await?;
    Ok(Json(resp))
}
