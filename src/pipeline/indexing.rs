use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunking::{chunk_document, TextSplitter};
use crate::git::FileSelector;
use crate::llm::Embedder;
use crate::models::{
    DocumentMetadata, FileChunk, ProcessResponse, ProcessStatus, RepoId, SourceDocument,
};
use crate::search::vector::Collection;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Repository with ID '{0}' not found")]
    NotFound(RepoId),
    #[error("Error processing repository: {0:#}")]
    Failed(#[from] anyhow::Error),
}

/// Turns a cloned repository into a searchable collection: select, read,
/// split, embed, store.
#[derive(Clone)]
pub struct Indexer {
    repos_dir: PathBuf,
    vector_dir: PathBuf,
    selector: FileSelector,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
}

/// What the blocking half of indexing found on disk.
enum Prepared {
    NoProcessableFiles,
    NoReadableFiles,
    Chunks {
        file_count: usize,
        chunks: Vec<FileChunk>,
    },
}

impl Indexer {
    pub fn new(
        repos_dir: impl Into<PathBuf>,
        vector_dir: impl Into<PathBuf>,
        selector: FileSelector,
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            repos_dir: repos_dir.into(),
            vector_dir: vector_dir.into(),
            selector,
            splitter,
            embedder,
        }
    }

    /// Index `repo_id`, replacing whatever its collection held before.
    pub async fn process(&self, repo_id: &RepoId) -> Result<ProcessResponse, IndexError> {
        let repo_dir = self.repos_dir.join(repo_id.as_str());
        if !repo_dir.is_dir() {
            return Err(IndexError::NotFound(repo_id.clone()));
        }
        let collection_name = repo_id.collection_name();
        tracing::info!("Processing repo {repo_id} into collection {collection_name}");

        let selector = self.selector.clone();
        let splitter = self.splitter.clone();
        let id = repo_id.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            prepare(&selector, &splitter, &repo_dir, &id)
        })
        .await
        .context("File loading task failed")?;

        let (file_count, chunks) = match prepared {
            Prepared::NoProcessableFiles => {
                tracing::warn!("Repo {repo_id} has no processable files");
                self.drop_stale_collection(&collection_name).await?;
                return Ok(empty_response(
                    ProcessStatus::NoProcessableFiles,
                    collection_name,
                ));
            }
            Prepared::NoReadableFiles => {
                tracing::warn!("Repo {repo_id} has no readable files");
                self.drop_stale_collection(&collection_name).await?;
                return Ok(empty_response(ProcessStatus::NoReadableFiles, collection_name));
            }
            Prepared::Chunks { file_count, chunks } => (file_count, chunks),
        };

        let texts: Vec<String> = chunks.iter().map(embedding_text).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .context("Failed to embed chunks")?;

        let vector_dir = self.vector_dir.clone();
        let name = collection_name.clone();
        let chunk_count = tokio::task::spawn_blocking(move || -> Result<usize> {
            let collection = Collection::open(&vector_dir, &name)?;
            collection.replace(&chunks, embeddings)
        })
        .await
        .context("Collection write task failed")??;

        tracing::info!("Indexed repo {repo_id}: {file_count} files, {chunk_count} chunks");

        Ok(ProcessResponse {
            status: ProcessStatus::Processed,
            file_count,
            chunk_count,
            collection_name,
        })
    }

    /// Remove whatever an earlier run stored for this repo.
    async fn drop_stale_collection(&self, collection_name: &str) -> Result<()> {
        let vector_dir = self.vector_dir.clone();
        let name = collection_name.to_string();
        let dropped = tokio::task::spawn_blocking(move || {
            Collection::drop_collection(&vector_dir, &name)
        })
        .await
        .context("Collection drop task failed")??;
        if dropped {
            tracing::info!("Dropped stale collection {collection_name}");
        }
        Ok(())
    }
}

fn empty_response(status: ProcessStatus, collection_name: String) -> ProcessResponse {
    ProcessResponse {
        status,
        file_count: 0,
        chunk_count: 0,
        collection_name,
    }
}

fn prepare(
    selector: &FileSelector,
    splitter: &TextSplitter,
    repo_dir: &Path,
    repo_id: &RepoId,
) -> Prepared {
    let files = selector.list_included_files(repo_dir);
    if files.is_empty() {
        return Prepared::NoProcessableFiles;
    }

    let documents = load_documents(repo_dir, &files, repo_id);
    if documents.is_empty() {
        return Prepared::NoReadableFiles;
    }

    let chunks = documents
        .iter()
        .flat_map(|doc| chunk_document(splitter, doc))
        .collect();

    Prepared::Chunks {
        file_count: files.len(),
        chunks,
    }
}

/// Read each file as UTF-8, dropping invalid byte sequences. Files that
/// cannot be read, and anything that is not a regular file, are skipped.
fn load_documents(repo_dir: &Path, files: &[PathBuf], repo_id: &RepoId) -> Vec<SourceDocument> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = match read_regular_file(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {e}", path.display());
                continue;
            }
        };
        let content: String = bytes.utf8_chunks().map(|c| c.valid()).collect();

        let relative = path.strip_prefix(repo_dir).unwrap_or(path);
        documents.push(SourceDocument {
            content,
            metadata: DocumentMetadata {
                file_path: relative.to_string_lossy().replace('\\', "/"),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                file_extension: path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
                repo_id: repo_id.to_string(),
            },
        });
    }
    documents
}

/// Contents of `path`, refusing symlinks so nothing outside the checkout is read.
fn read_regular_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let meta = std::fs::symlink_metadata(path)?;
    if !meta.file_type().is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    std::fs::read(path)
}

/// Text handed to the embedder for a chunk. The path gives the vector a hint
/// of where the code lives.
fn embedding_text(chunk: &FileChunk) -> String {
    format!("File: {}\n{}", chunk.metadata.file_path, chunk.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns `[len, 1.0]` per text and remembers what it was asked.
    #[derive(Default)]
    struct RecordingEmbedder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.lock().extend(texts.iter().cloned());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("embedding service unavailable")
        }
    }

    fn indexer(root: &Path, embedder: Arc<dyn Embedder>) -> Indexer {
        Indexer::new(
            root.join("repos"),
            root.join("vectordb"),
            FileSelector::new([".py", ".rs", ".md"]),
            TextSplitter::default(),
            embedder,
        )
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join("repos").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_process_missing_repo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let idx = indexer(dir.path(), Arc::new(RecordingEmbedder::default()));
        let err = idx
            .process(&RepoId::parse("ghost").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
        assert_eq!(err.to_string(), "Repository with ID 'ghost' not found");
    }

    #[tokio::test]
    async fn test_process_single_file_repo() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "widgets/main.py", b"def main():\n    print('widgets')\n");
        let embedder = Arc::new(RecordingEmbedder::default());
        let idx = indexer(dir.path(), embedder.clone());

        let id = RepoId::parse("widgets").unwrap();
        let resp = idx.process(&id).await.unwrap();
        assert_eq!(resp.status, ProcessStatus::Processed);
        assert_eq!(resp.file_count, 1);
        assert_eq!(resp.chunk_count, 1);
        assert_eq!(resp.collection_name, "repo_widgets");

        let seen = embedder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("File: main.py\n"));

        let col = Collection::open(&dir.path().join("vectordb"), "repo_widgets").unwrap();
        assert_eq!(col.count(), 1);
    }

    #[tokio::test]
    async fn test_process_no_processable_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "assets/logo.png", b"\x89PNG");
        write(dir.path(), "assets/node_modules/lib.py", b"x = 1");
        let idx = indexer(dir.path(), Arc::new(RecordingEmbedder::default()));

        let resp = idx.process(&RepoId::parse("assets").unwrap()).await.unwrap();
        assert_eq!(resp.status, ProcessStatus::NoProcessableFiles);
        assert_eq!(resp.file_count, 0);
        assert_eq!(resp.chunk_count, 0);
        assert!(!Collection::exists(&dir.path().join("vectordb"), "repo_assets"));
    }

    #[tokio::test]
    async fn test_reprocess_replaces_collection() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "svc/a.rs", b"fn a() {}");
        write(dir.path(), "svc/b.rs", b"fn b() {}");
        let idx = indexer(dir.path(), Arc::new(RecordingEmbedder::default()));
        let id = RepoId::parse("svc").unwrap();

        idx.process(&id).await.unwrap();
        let second = idx.process(&id).await.unwrap();
        assert_eq!(second.chunk_count, 2);

        let col = Collection::open(&dir.path().join("vectordb"), "repo_svc").unwrap();
        assert_eq!(col.count(), 2);
    }

    #[tokio::test]
    async fn test_process_embedding_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "svc/a.rs", b"fn a() {}");
        let idx = indexer(dir.path(), Arc::new(FailingEmbedder));

        let err = idx.process(&RepoId::parse("svc").unwrap()).await.unwrap_err();
        assert!(matches!(err, IndexError::Failed(_)));
        let msg = err.to_string();
        assert!(msg.starts_with("Error processing repository: "));
        assert!(msg.contains("embedding service unavailable"));
    }

    #[test]
    fn test_load_documents_metadata_and_lossy_decode() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/app.PY"), b"ok\xff\xfe = 1").unwrap();
        std::fs::write(root.join("Makefile"), b"all:").unwrap();

        let files = vec![
            root.join("Makefile"),
            root.join("src/app.PY"),
            root.join("src/missing.py"),
        ];
        let id = RepoId::parse("svc").unwrap();
        let docs = load_documents(root, &files, &id);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.file_extension, "");
        assert_eq!(docs[1].content, "ok = 1");
        assert_eq!(
            docs[1].metadata,
            DocumentMetadata {
                file_path: "src/app.PY".to_string(),
                file_name: "app.PY".to_string(),
                file_extension: ".PY".to_string(),
                repo_id: "svc".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_reprocess_without_files_drops_old_collection() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "svc/a.rs", b"fn a() {}");
        let idx = indexer(dir.path(), Arc::new(RecordingEmbedder::default()));
        let id = RepoId::parse("svc").unwrap();

        idx.process(&id).await.unwrap();
        assert!(Collection::exists(&dir.path().join("vectordb"), "repo_svc"));

        std::fs::remove_file(dir.path().join("repos/svc/a.rs")).unwrap();
        let resp = idx.process(&id).await.unwrap();
        assert_eq!(resp.status, ProcessStatus::NoProcessableFiles);
        assert!(!Collection::exists(&dir.path().join("vectordb"), "repo_svc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_ignores_links_out_of_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, "OPENAI_API_KEY=sk-leaked").unwrap();
        write(dir.path(), "evil/main.py", b"print('hello')");
        let repo = dir.path().join("repos/evil");
        std::os::unix::fs::symlink(&secret, repo.join("notes.md")).unwrap();
        std::os::unix::fs::symlink("/proc/self/environ", repo.join("env.py")).unwrap();

        let embedder = Arc::new(RecordingEmbedder::default());
        let idx = indexer(dir.path(), embedder.clone());
        let resp = idx.process(&RepoId::parse("evil").unwrap()).await.unwrap();
        assert_eq!(resp.file_count, 1);
        assert_eq!(resp.chunk_count, 1);

        let seen = embedder.seen.lock();
        assert!(seen.iter().all(|t| !t.contains("sk-leaked")));
        assert!(seen.iter().all(|t| t.starts_with("File: main.py\n")));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_documents_skips_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let outside = dir.path().join("outside.md");
        std::fs::write(&outside, "private").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("README.md")).unwrap();

        let docs = load_documents(&root, &[root.join("README.md")], &RepoId::parse("repo").unwrap());
        assert!(docs.is_empty());
    }
}
