use std::sync::Arc;
use std::time::Duration;

use crate::chunking::TextSplitter;
use crate::config::Config;
use crate::git::{FileSelector, GitCloner, RepoCloner, RepoFetcher};
use crate::llm::{Completer, Embedder, LlmClient};
use crate::pipeline::{Indexer, QueryEngine};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: RepoFetcher,
    pub selector: FileSelector,
    pub indexer: Indexer,
    pub query: QueryEngine,
    pub clone_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    /// Production wiring: libgit2 for clones, the configured LLM provider for
    /// embeddings and completions.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let llm = Arc::new(LlmClient::new(config.llm.clone())?);
        Self::with_capabilities(config, Arc::new(GitCloner), llm.clone(), llm)
    }

    pub fn with_capabilities(
        config: Config,
        cloner: Arc<dyn RepoCloner>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> anyhow::Result<Self> {
        // Ensure data directories exist
        std::fs::create_dir_all(&config.repos_dir)?;
        std::fs::create_dir_all(&config.vector_dir)?;

        let selector = FileSelector::new(&config.supported_extensions);
        let fetcher = RepoFetcher::new(
            config.repos_dir.clone(),
            config.max_repo_size_mb,
            Duration::from_secs(config.clone_timeout_secs),
            cloner,
        );
        let indexer = Indexer::new(
            config.repos_dir.clone(),
            config.vector_dir.clone(),
            selector.clone(),
            TextSplitter::default(),
            embedder.clone(),
        );
        let query = QueryEngine::new(config.vector_dir.clone(), embedder, completer);
        let max_concurrent_clones = config.max_concurrent_clones.max(1);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            selector,
            indexer,
            query,
            clone_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_clones)),
        })
    }
}
