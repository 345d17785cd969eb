use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::git::FetchError;
use crate::models::InvalidRepoId;
use crate::pipeline::{IndexError, QueryError};

/// Errors surfaced by the HTTP handlers. Rendered as `{"detail": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn repo_not_found(repo_id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("Repository with ID '{repo_id}' not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<InvalidRepoId> for ApiError {
    fn from(e: InvalidRepoId) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::UnsupportedOrigin
            | FetchError::InvalidIdentifier(_)
            | FetchError::SizeLimitExceeded { .. } => ApiError::BadRequest(e.to_string()),
            FetchError::CloneFailed(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::NotFound(_) => ApiError::NotFound(e.to_string()),
            IndexError::Failed(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::EmptyQuestion | QueryError::NotProcessed(_) => {
                ApiError::BadRequest(e.to_string())
            }
            QueryError::Failed(_) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoId;

    #[test]
    fn test_fetch_error_mapping() {
        assert_eq!(
            ApiError::from(FetchError::UnsupportedOrigin).status(),
            StatusCode::BAD_REQUEST
        );
        let size = FetchError::SizeLimitExceeded {
            size_mb: 120.0,
            limit_mb: 100,
        };
        assert_eq!(ApiError::from(size).status(), StatusCode::BAD_REQUEST);
        let failed = ApiError::from(FetchError::CloneFailed("boom".into()));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.to_string(), "Failed to clone repository: boom");
    }

    #[test]
    fn test_index_and_query_error_mapping() {
        let id = RepoId::parse("widgets").unwrap();
        assert_eq!(
            ApiError::from(IndexError::NotFound(id.clone())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(QueryError::NotProcessed(id)).status(),
            StatusCode::BAD_REQUEST
        );
        let failed = ApiError::from(QueryError::Failed(anyhow::anyhow!("down")));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.to_string(), "Error chatting with repository: down");
    }

    #[test]
    fn test_invalid_id_is_bad_request() {
        let err = RepoId::parse("..").unwrap_err();
        assert_eq!(ApiError::from(err).status(), StatusCode::BAD_REQUEST);
    }
}
