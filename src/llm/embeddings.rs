use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Maximum characters sent per text to the embedding API. A chunk is at most
/// 2000 characters plus a `File: <path>` header, so only a very long path or
/// question is ever cut.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS` characters.
fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Generate embeddings for a batch of texts using the configured LLM provider.
/// The result is parallel with `texts`.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let truncated: Vec<String> = texts
        .iter()
        .map(|t| truncate_for_embedding(t).to_string())
        .collect();

    let embeddings = match config.provider.as_str() {
        "ollama" => embed_ollama(client, config, &truncated).await?,
        "openai" => embed_openai(client, config, &truncated).await?,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    };

    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Embedding provider returned {} vectors for {} inputs",
            embeddings.len(),
            texts.len()
        );
    }
    Ok(embeddings)
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Let Ollama truncate inputs longer than the model context.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);

    let batch_size = 32;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embed API returned {status}: {body}");
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama embed response")?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI ──────────────────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// The API may return items out of order; `index` is authoritative.
fn order_openai_embeddings(mut data: Vec<OpenAiEmbedData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embed API returned {status}: {body}");
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI embed response")?;

        all_embeddings.extend(order_openai_embeddings(body.data));
    }

    Ok(all_embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_embedding_short_text_untouched() {
        assert_eq!(truncate_for_embedding("fn main() {}"), "fn main() {}");
    }

    #[test]
    fn test_truncate_for_embedding_counts_characters() {
        let text = "é".repeat(MAX_EMBED_CHARS + 10);
        let cut = truncate_for_embedding(&text);
        assert_eq!(cut.chars().count(), MAX_EMBED_CHARS);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_full_size_multibyte_chunk_untouched() {
        let chunk = format!("File: src/lib.rs\n{}", "漢".repeat(2000));
        assert!(chunk.len() > MAX_EMBED_CHARS);
        assert_eq!(truncate_for_embedding(&chunk), chunk);
    }

    #[test]
    fn test_openai_response_reordered_by_index() {
        let json = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let body: OpenAiEmbedResponse = serde_json::from_str(json).unwrap();
        let ordered = order_openai_embeddings(body.data);
        assert_eq!(ordered, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_ollama_response_parses() {
        let json = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let body: OllamaEmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_embed_batch_empty_input_makes_no_call() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..LlmConfig::default()
        };
        let out = embed_batch(&client, &config, &[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_embed_batch_unknown_provider() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..LlmConfig::default()
        };
        let err = embed_batch(&client, &config, &["x".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
