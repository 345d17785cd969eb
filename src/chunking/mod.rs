//! Document chunking: overlapping character windows split at paragraph, line,
//! then character boundaries.

pub mod recursive;

pub use recursive::TextSplitter;

use crate::models::{FileChunk, SourceDocument};

/// Output of the chunking process.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutput {
    pub content: String,
    /// Byte offset of the chunk in the original text.
    pub start_offset: usize,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
}

/// Split one document into chunks that carry its metadata unchanged.
pub fn chunk_document(splitter: &TextSplitter, doc: &SourceDocument) -> Vec<FileChunk> {
    splitter
        .split(&doc.content)
        .into_iter()
        .enumerate()
        .map(|(i, c)| FileChunk {
            content: c.content,
            metadata: doc.metadata.clone(),
            chunk_index: i,
            start_line: c.start_line,
            end_line: c.end_line,
        })
        .collect()
}
