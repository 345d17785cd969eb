use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{DocumentMetadata, FileChunk};

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: Uuid,
    content: String,
    metadata: DocumentMetadata,
    chunk_index: usize,
    start_line: usize,
    end_line: usize,
    embedding: Vec<f32>,
}

/// On-disk layout of one collection.
#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    updated_at: DateTime<Utc>,
    entries: Vec<VectorEntry>,
}

/// One repository's chunks and their embeddings, persisted as
/// `<vector_dir>/<name>.json` and searched by cosine similarity.
///
/// A collection is loaded from disk when opened and dropped after use; nothing
/// is cached between requests.
pub struct Collection {
    name: String,
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk: FileChunk,
    pub score: f32,
}

impl Collection {
    /// Open a collection, or an empty one if it has never been written.
    pub fn open(vector_dir: &Path, name: &str) -> Result<Self> {
        let persist_path = collection_path(vector_dir, name);

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .with_context(|| format!("Failed to read collection {name}"))?;
            let file: CollectionFile = serde_json::from_str(&data)
                .with_context(|| format!("Collection {name} is corrupt"))?;
            file.entries
        } else {
            Vec::new()
        };

        Ok(Self {
            name: name.to_string(),
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    pub fn exists(vector_dir: &Path, name: &str) -> bool {
        collection_path(vector_dir, name).exists()
    }

    /// Remove a collection from disk. Returns whether it existed.
    pub fn drop_collection(vector_dir: &Path, name: &str) -> Result<bool> {
        let path = collection_path(vector_dir, name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete collection {name}"))?;
        Ok(true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append chunks. `embeddings` must be parallel with `chunks`.
    pub fn add(&self, chunks: &[FileChunk], embeddings: Vec<Vec<f32>>) -> Result<usize> {
        let new_entries = build_entries(chunks, embeddings)?;
        let added = new_entries.len();
        let mut entries = self.entries.write();
        entries.extend(new_entries);
        self.persist(&entries)?;
        Ok(added)
    }

    /// Swap the whole content of the collection for `chunks` in one write.
    pub fn replace(&self, chunks: &[FileChunk], embeddings: Vec<Vec<f32>>) -> Result<usize> {
        let new_entries = build_entries(chunks, embeddings)?;
        let mut entries = self.entries.write();
        *entries = new_entries;
        self.persist(&entries)?;
        Ok(entries.len())
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Top `limit` chunks by cosine similarity to `query_embedding`.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                chunk: FileChunk {
                    content: e.content.clone(),
                    metadata: e.metadata.clone(),
                    chunk_index: e.chunk_index,
                    start_line: e.start_line,
                    end_line: e.end_line,
                },
                score,
            })
            .collect()
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        if let Some(parent) = self.persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CollectionFile {
            name: self.name.clone(),
            updated_at: Utc::now(),
            entries: entries.to_vec(),
        };
        let data = serde_json::to_string(&file)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write collection {}", self.name))?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .with_context(|| format!("Failed to commit collection {}", self.name))?;
        Ok(())
    }
}

fn collection_path(vector_dir: &Path, name: &str) -> PathBuf {
    vector_dir.join(format!("{name}.json"))
}

fn build_entries(chunks: &[FileChunk], embeddings: Vec<Vec<f32>>) -> Result<Vec<VectorEntry>> {
    if chunks.len() != embeddings.len() {
        anyhow::bail!(
            "Got {} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        );
    }
    Ok(chunks
        .iter()
        .zip(embeddings)
        .map(|(c, embedding)| VectorEntry {
            id: Uuid::new_v4(),
            content: c.content.clone(),
            metadata: c.metadata.clone(),
            chunk_index: c.chunk_index,
            start_line: c.start_line,
            end_line: c.end_line,
            embedding,
        })
        .collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
