use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::{Completer, Embedder};
use crate::models::{ChatMessage, ChatResponse, RepoId, SourceRecord};
use crate::search::vector::{Collection, VectorHit};

/// Chunks retrieved per question.
pub const RETRIEVAL_K: usize = 5;
const PREVIEW_CHARS: usize = 200;
const MAX_QUESTION_LEN: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Question is required")]
    EmptyQuestion,
    #[error("Repository '{0}' has not been processed for RAG. Please process it first.")]
    NotProcessed(RepoId),
    #[error("Error chatting with repository: {0:#}")]
    Failed(#[from] anyhow::Error),
}

/// Answers questions about one repository from its collection.
#[derive(Clone)]
pub struct QueryEngine {
    vector_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
}

impl QueryEngine {
    pub fn new(
        vector_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            vector_dir: vector_dir.into(),
            embedder,
            completer,
        }
    }

    pub async fn ask(&self, repo_id: &RepoId, question: &str) -> Result<ChatResponse, QueryError> {
        let question = sanitize_for_prompt(&truncate_to_char_boundary(
            question.trim(),
            MAX_QUESTION_LEN,
        ));
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let collection = self.open_processed(repo_id).await?;

        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&question))
            .await
            .context("Failed to embed question")?
            .into_iter()
            .next()
            .context("No embedding returned for question")?;

        let hits = collection.search(&query_embedding, RETRIEVAL_K);
        tracing::info!("Retrieved {} chunks from {}", hits.len(), collection.name());

        let messages = build_messages(repo_id, &hits, &question);
        let answer = self
            .completer
            .complete(messages)
            .await
            .context("Completion failed")?;

        Ok(ChatResponse {
            answer,
            sources: hits.iter().map(source_record).collect(),
            repo_id: repo_id.to_string(),
        })
    }

    /// The repository's collection, provided it holds at least one chunk.
    async fn open_processed(&self, repo_id: &RepoId) -> Result<Collection, QueryError> {
        let vector_dir = self.vector_dir.clone();
        let name = repo_id.collection_name();
        let opened = tokio::task::spawn_blocking(move || Collection::open(&vector_dir, &name))
            .await
            .context("Collection load task failed")?;

        match opened {
            Ok(collection) if collection.count() > 0 => Ok(collection),
            Ok(_) => Err(QueryError::NotProcessed(repo_id.clone())),
            Err(e) => {
                tracing::warn!("Could not open collection for {repo_id}: {e:#}");
                Err(QueryError::NotProcessed(repo_id.clone()))
            }
        }
    }
}

fn build_system_prompt(hits: &[VectorHit]) -> String {
    let mut prompt = String::from(
        "You are a code assistant answering questions about a single repository.\n\
         Use the following pieces of source code to answer the question.\n\
         If the code does not contain the answer, say so instead of guessing.\n\n",
    );
    prompt.push_str(&build_context_block(hits));
    prompt
}

fn build_context_block(hits: &[VectorHit]) -> String {
    let mut ctx = String::new();

    if hits.is_empty() {
        ctx.push_str("(No relevant code was found for this question.)\n");
        return ctx;
    }

    for hit in hits {
        let chunk = &hit.chunk;
        let _ = write!(
            ctx,
            "--- {} (lines {}-{}) ---\n{}\n\n",
            chunk.metadata.file_path,
            chunk.start_line,
            chunk.end_line,
            sanitize_for_prompt(&chunk.content)
        );
    }
    ctx
}

/// The question wrapped with repository context and answer-shape instructions.
fn enhance_question(repo_id: &RepoId, question: &str) -> String {
    format!(
        "You are analyzing the codebase for repository '{repo_id}'. \
         Please provide a helpful and detailed answer based on the code context.\n\n\
         Question: {question}\n\n\
         Please include relevant code snippets and file references in your answer."
    )
}

fn build_messages(repo_id: &RepoId, hits: &[VectorHit], question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_system_prompt(hits)),
        ChatMessage::user(enhance_question(repo_id, question)),
    ]
}

fn source_record(hit: &VectorHit) -> SourceRecord {
    let content = &hit.chunk.content;
    let content_preview = if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.clone()
    };
    SourceRecord {
        file_path: hit.chunk.metadata.file_path.clone(),
        file_name: hit.chunk.metadata.file_name.clone(),
        content_preview,
    }
}

/// Strip chat-template control tokens so file content and questions cannot
/// open a new turn in the prompt.
pub fn sanitize_for_prompt(text: &str) -> String {
    const CONTROL_TOKENS: &[&str] = &["<|im_start|>", "<|im_end|>", "<|endoftext|>"];
    let mut out = text.to_string();
    for token in CONTROL_TOKENS {
        if out.contains(token) {
            out = out.replace(token, "");
        }
    }
    out
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s.char_indices()
        .take_while(|(i, _)| *i < max_len)
        .map(|(_, c)| c)
        .collect()
}
