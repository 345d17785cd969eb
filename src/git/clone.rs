use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{InvalidRepoId, RepoId};

/// Only repositories hosted here can be cloned.
pub const ALLOWED_ORIGIN: &str = "https://github.com/";

/// The VCS capability: produce a full checkout of `url` at `target`.
///
/// `cancel` is raised when the caller gives up; implementations should stop
/// as soon as they notice it and return an error.
pub trait RepoCloner: Send + Sync {
    fn clone_repo(&self, url: &str, target: &Path, cancel: &AtomicBool) -> Result<()>;
}

/// Clones with libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCloner;

impl RepoCloner for GitCloner {
    fn clone_repo(&self, url: &str, target: &Path, cancel: &AtomicBool) -> Result<()> {
        tracing::info!("Cloning {} into {}", url, target.display());

        // Returning false from the progress callback aborts the fetch.
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.transfer_progress(|_| !cancel.load(Ordering::Relaxed));
        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        git2::build::RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, target)
            .with_context(|| format!("Failed to clone {url}"))?;
        tracing::info!("Clone complete: {}", target.display());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Only GitHub URLs are supported")]
    UnsupportedOrigin,
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidRepoId),
    #[error("Repository exceeds size limit")]
    SizeLimitExceeded { size_mb: f64, limit_mb: u64 },
    #[error("Failed to clone repository: {0}")]
    CloneFailed(String),
}

/// Clones repositories into `<repos_dir>/<repo_id>`, enforcing the origin and
/// size rules. Every clone is a fresh full checkout.
#[derive(Clone)]
pub struct RepoFetcher {
    repos_dir: PathBuf,
    max_repo_size_mb: u64,
    clone_timeout: Duration,
    cloner: Arc<dyn RepoCloner>,
}

impl RepoFetcher {
    pub fn new(
        repos_dir: impl Into<PathBuf>,
        max_repo_size_mb: u64,
        clone_timeout: Duration,
        cloner: Arc<dyn RepoCloner>,
    ) -> Self {
        Self {
            repos_dir: repos_dir.into(),
            max_repo_size_mb,
            clone_timeout,
            cloner,
        }
    }

    pub fn repo_dir(&self, repo_id: &RepoId) -> PathBuf {
        self.repos_dir.join(repo_id.as_str())
    }

    /// Clone `url` and return its identifier. On any failure the target
    /// directory is removed before the error is returned.
    pub async fn clone_repository(&self, url: &str) -> Result<RepoId, FetchError> {
        let url = url.trim();
        if !url.starts_with(ALLOWED_ORIGIN) {
            return Err(FetchError::UnsupportedOrigin);
        }
        let repo_id = derive_repo_id(url)?;
        let repo_dir = self.repo_dir(&repo_id);

        let previous = repo_dir.clone();
        let new_origin = url.to_string();
        tokio::task::spawn_blocking(move || replace_existing(&previous, &new_origin))
            .await
            .map_err(|e| FetchError::CloneFailed(format!("cleanup task failed: {e}")))?
            .map_err(|e| FetchError::CloneFailed(format!("{e:#}")))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let cloner = self.cloner.clone();
        let url_owned = url.to_string();
        let target = repo_dir.clone();
        let flag = cancel.clone();
        let mut handle =
            tokio::task::spawn_blocking(move || cloner.clone_repo(&url_owned, &target, &flag));

        let failure = match tokio::time::timeout(self.clone_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(format!("{e:#}")),
            Ok(Err(e)) => Some(format!("clone task failed: {e}")),
            Err(_) => {
                // The blocking clone keeps writing until it sees the flag.
                cancel.store(true, Ordering::Relaxed);
                if let Err(e) = handle.await {
                    tracing::warn!("Cancelled clone task failed: {e}");
                }
                Some(format!("timed out after {:?}", self.clone_timeout))
            }
        };
        if let Some(message) = failure {
            tracing::error!("Clone of {url} failed: {message}");
            let partial = repo_dir.clone();
            let _ = tokio::task::spawn_blocking(move || remove_quietly(&partial)).await;
            return Err(FetchError::CloneFailed(message));
        }

        let size_dir = repo_dir.clone();
        let size_bytes = tokio::task::spawn_blocking(move || super::dir_size_bytes(&size_dir))
            .await
            .map_err(|e| FetchError::CloneFailed(format!("size check failed: {e}")))?;
        let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
        if size_mb > self.max_repo_size_mb as f64 {
            tracing::error!(
                "Repo {repo_id} is {size_mb:.2} MB, over the {} MB limit",
                self.max_repo_size_mb
            );
            let oversized = repo_dir.clone();
            let _ = tokio::task::spawn_blocking(move || remove_quietly(&oversized)).await;
            return Err(FetchError::SizeLimitExceeded {
                size_mb,
                limit_mb: self.max_repo_size_mb,
            });
        }

        tracing::info!("Repo {repo_id} ready at {} ({size_mb:.2} MB)", repo_dir.display());
        Ok(repo_id)
    }
}

/// Final path segment of `url`, with a trailing `.git` stripped.
pub fn derive_repo_id(url: &str) -> Result<RepoId, InvalidRepoId> {
    let segment = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    RepoId::parse(name)
}

/// Make room for a fresh clone at `repo_dir`: remove any previous checkout
/// (warning when it came from another origin) and create the parent.
fn replace_existing(repo_dir: &Path, url: &str) -> Result<()> {
    if repo_dir.exists() {
        if let Some(origin) = existing_origin(repo_dir) {
            if origin != url {
                tracing::warn!(
                    "{} was cloned from {origin}; replacing it with {url}",
                    repo_dir.display()
                );
            }
        }
        tracing::info!("Removing existing clone at {}", repo_dir.display());
        std::fs::remove_dir_all(repo_dir).context("could not remove existing clone")?;
    }
    if let Some(parent) = repo_dir.parent() {
        std::fs::create_dir_all(parent).context("could not create repos directory")?;
    }
    Ok(())
}

/// URL of the `origin` remote of an existing checkout, if there is one.
fn existing_origin(repo_dir: &Path) -> Option<String> {
    let repo = git2::Repository::open(repo_dir).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(str::to_string)
}

fn remove_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Failed to clean up {}: {e}", dir.display());
        }
    }
}
