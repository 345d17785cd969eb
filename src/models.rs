use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Local short name of a cloned repository, e.g. `widgets` for
/// `https://github.com/acme/widgets.git`. Always safe to join onto a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepoId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid repository identifier: '{0}'")]
pub struct InvalidRepoId(pub String);

impl RepoId {
    pub fn parse(raw: &str) -> Result<Self, InvalidRepoId> {
        let invalid = raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0'])
            || raw.chars().any(char::is_control);
        if invalid {
            return Err(InvalidRepoId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Vector-store collection holding this repo's chunks: `repo_` prefix,
    /// with `-` and `.` replaced by `_`.
    pub fn collection_name(&self) -> String {
        format!("repo_{}", self.0).replace(['-', '.'], "_")
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RepoId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RepoId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Metadata attached to a source document and copied onto each of its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Repo-relative path, `/`-separated
    pub file_path: String,
    pub file_name: String,
    /// Final suffix including the dot, original case; empty when absent
    pub file_extension: String,
    pub repo_id: String,
}

/// One readable file of a repository.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A single indexed chunk of a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    pub start_line: usize,
    pub end_line: usize,
}

/// A single chat turn sent to the completion provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// ─── HTTP request/response bodies ────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CloneRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneResponse {
    pub repo_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Processed,
    NoProcessableFiles,
    NoReadableFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: ProcessStatus,
    pub file_count: usize,
    pub chunk_count: usize,
    pub collection_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// A retrieved chunk as reported back to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub file_path: String,
    pub file_name: String,
    pub content_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
    pub repo_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub processed: bool,
    pub chunk_count: usize,
    pub collection_name: String,
    pub repo_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
}

/// Entry of `GET /api/v1/repos`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    pub repo_id: String,
    pub path: String,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub repo_id: String,
    pub path: String,
    pub size_mb: f64,
    pub file_count: usize,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub repo_id: String,
    pub status: String,
    pub message: String,
}

/// Breakdown of what the file selector would index in a repo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStats {
    pub total_files: usize,
    pub processable_files: usize,
    pub total_size_mb: f64,
    pub extension_counts: BTreeMap<String, usize>,
    pub supported_extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_sanitizes() {
        let id = RepoId::parse("my-repo.js").unwrap();
        assert_eq!(id.collection_name(), "repo_my_repo_js");
        let id = RepoId::parse("widgets").unwrap();
        assert_eq!(id.collection_name(), "repo_widgets");
    }

    #[test]
    fn test_repo_id_rejects_traversal() {
        assert!(RepoId::parse("").is_err());
        assert!(RepoId::parse(".").is_err());
        assert!(RepoId::parse("..").is_err());
        assert!(RepoId::parse("a/b").is_err());
        assert!(RepoId::parse("a\\b").is_err());
        assert!(RepoId::parse("..hidden").is_ok());
    }

    #[test]
    fn test_process_status_serializes_to_snake_case() {
        let json = serde_json::to_value(ProcessStatus::NoProcessableFiles).unwrap();
        assert_eq!(json, "no_processable_files");
    }

    #[test]
    fn test_status_response_omits_absent_repo_fields() {
        let status = StatusResponse {
            processed: false,
            chunk_count: 0,
            collection_name: "repo_x".into(),
            repo_exists: false,
            repo_size_mb: None,
            total_files: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("repo_size_mb").is_none());
        assert!(json.get("total_files").is_none());
    }

    #[test]
    fn test_repo_id_deserialize_validates() {
        let ok: RepoId = serde_json::from_str("\"widgets\"").unwrap();
        assert_eq!(ok.as_str(), "widgets");
        assert!(serde_json::from_str::<RepoId>("\"..\"").is_err());
    }
}
