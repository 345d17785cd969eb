//! Embedding and completion providers.
//!
//! The pipelines only see the [`Embedder`] and [`Completer`] traits;
//! [`LlmClient`] implements both over HTTP for OpenAI and Ollama.

pub mod completion;
pub mod embeddings;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Turns texts into fixed-length vectors. The output is parallel with the input.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces the assistant reply for a conversation.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embeddings::embed_batch(&self.http, &self.config, texts).await
    }
}

#[async_trait]
impl Completer for LlmClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        completion::complete(&self.http, &self.config, messages).await
    }
}
