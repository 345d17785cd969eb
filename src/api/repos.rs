use axum::extract::{Path, State};
use axum::Json;

use super::blocking;
use crate::error::ApiError;
use crate::git::{count_files, dir_size_bytes, round_mb};
use crate::models::{
    CloneRequest, CloneResponse, DeleteResponse, FileStats, ProcessResponse, RepoId, RepoInfo,
    RepoSummary, StatusResponse,
};
use crate::search::vector::Collection;
use crate::state::AppState;

/// POST /api/v1/repos/clone - Clone a GitHub repository
pub async fn clone_repo(
    State(state): State<AppState>,
    Json(req): Json<CloneRequest>,
) -> Result<Json<CloneResponse>, ApiError> {
    let _permit = state
        .clone_semaphore
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("Clone queue closed".to_string()))?;

    let repo_id = state.fetcher.clone_repository(&req.url).await?;

    Ok(Json(CloneResponse {
        message: format!("Repository successfully cloned with ID: {repo_id}"),
        repo_id: repo_id.to_string(),
        status: "cloned".to_string(),
    }))
}

/// POST /api/v1/repos/{id}/process - Index a cloned repository
pub async fn process_repo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    let resp = state.indexer.process(&repo_id).await?;
    Ok(Json(resp))
}

/// GET /api/v1/repos/{id}/status - Whether the repo has been indexed
pub async fn repo_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    let collection_name = repo_id.collection_name();
    let vector_dir = state.config.vector_dir.clone();
    let repo_dir = state.fetcher.repo_dir(&repo_id);

    let name = collection_name.clone();
    let status = blocking(move || {
        let chunk_count = match Collection::open(&vector_dir, &name) {
            Ok(collection) => collection.count(),
            Err(e) => {
                tracing::warn!("Could not open collection {name}: {e:#}");
                0
            }
        };

        let repo_exists = repo_dir.is_dir();
        let (repo_size_mb, total_files) = if repo_exists {
            (
                Some(round_mb(dir_size_bytes(&repo_dir))),
                Some(count_files(&repo_dir)),
            )
        } else {
            (None, None)
        };

        StatusResponse {
            processed: chunk_count > 0,
            chunk_count,
            collection_name: name,
            repo_exists,
            repo_size_mb,
            total_files,
        }
    })
    .await?;

    Ok(Json(status))
}

/// GET /api/v1/repos/{id}/files - What the selector would index
pub async fn file_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileStats>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    let repo_dir = state.fetcher.repo_dir(&repo_id);
    if !repo_dir.is_dir() {
        return Err(ApiError::repo_not_found(&repo_id));
    }

    let selector = state.selector.clone();
    let stats = blocking(move || selector.file_stats(&repo_dir)).await?;
    Ok(Json(stats))
}

/// GET /api/v1/repos - List cloned repositories, sorted by id
pub async fn list_repos(
    State(state): State<AppState>,
) -> Result<Json<Vec<RepoSummary>>, ApiError> {
    let repos_dir = state.config.repos_dir.clone();
    let repos = blocking(move || {
        let Ok(entries) = std::fs::read_dir(&repos_dir) else {
            return Vec::new();
        };

        let mut repos: Vec<RepoSummary> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| {
                let path = e.path();
                RepoSummary {
                    repo_id: e.file_name().to_string_lossy().into_owned(),
                    size_mb: round_mb(dir_size_bytes(&path)),
                    path: path.display().to_string(),
                }
            })
            .collect();
        repos.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));
        repos
    })
    .await?;

    Ok(Json(repos))
}

/// GET /api/v1/repos/{id} - Details of one cloned repository
pub async fn repo_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RepoInfo>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    let repo_dir = state.fetcher.repo_dir(&repo_id);
    if !repo_dir.is_dir() {
        return Err(ApiError::repo_not_found(&repo_id));
    }

    let info = blocking(move || RepoInfo {
        repo_id: repo_id.to_string(),
        size_mb: round_mb(dir_size_bytes(&repo_dir)),
        file_count: count_files(&repo_dir),
        path: repo_dir.display().to_string(),
        exists: true,
    })
    .await?;

    Ok(Json(info))
}

/// DELETE /api/v1/repos/{id} - Remove the checkout and its collection
pub async fn delete_repo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let repo_id = RepoId::parse(&id)?;
    let repo_dir = state.fetcher.repo_dir(&repo_id);
    if !repo_dir.is_dir() {
        return Err(ApiError::repo_not_found(&repo_id));
    }

    let repos_dir = state.config.repos_dir.clone();
    let vector_dir = state.config.vector_dir.clone();
    let id = repo_id.clone();
    blocking(move || -> Result<(), ApiError> {
        std::fs::remove_dir_all(&repo_dir)
            .map_err(|e| ApiError::Internal(format!("Failed to delete repository: {e}")))?;

        let collection_name = id.collection_name();
        let sharing = checkouts_sharing_collection(&repos_dir, &id);
        if !sharing.is_empty() {
            tracing::warn!(
                "Keeping collection {collection_name}: still used by {}",
                sharing.join(", ")
            );
            return Ok(());
        }
        if let Err(e) = Collection::drop_collection(&vector_dir, &collection_name) {
            tracing::warn!("Failed to drop collection {collection_name}: {e:#}");
        }
        Ok(())
    })
    .await??;

    tracing::info!("Deleted repo {repo_id}");
    Ok(Json(DeleteResponse {
        message: format!("Repository '{repo_id}' successfully deleted"),
        repo_id: repo_id.to_string(),
        status: "deleted".to_string(),
    }))
}

/// Other checkouts whose ids sanitize to the same collection as `repo_id`
/// (`my-repo` and `my.repo` both map to `repo_my_repo`).
fn checkouts_sharing_collection(repos_dir: &std::path::Path, repo_id: &RepoId) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(repos_dir) else {
        return Vec::new();
    };
    let collection_name = repo_id.collection_name();
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| RepoId::parse(&e.file_name().to_string_lossy()).ok())
        .filter(|other| other != repo_id && other.collection_name() == collection_name)
        .map(|other| other.to_string())
        .collect()
}
