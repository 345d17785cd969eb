//! Recursive character splitter.
//!
//! Tries separators in order (paragraph, line, character). A text is split on
//! the first separator it contains, keeping the separator at the start of the
//! following piece; pieces that are still too large are split again with the
//! remaining separators. Small pieces are then merged greedily up to the chunk
//! size, and each new chunk starts with up to `chunk_overlap` characters taken
//! from the tail of the previous one.
//!
//! Every chunk is a contiguous slice of the input, so chunks are tracked as
//! byte ranges until the very end.

use std::collections::VecDeque;
use std::ops::Range;

use super::ChunkOutput;

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ""];

/// Sizes are measured in characters, not bytes.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// Overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.to_vec(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Whitespace-only input yields nothing; input
    /// that fits in one chunk comes back unchanged as a single chunk.
    pub fn split(&self, text: &str) -> Vec<ChunkOutput> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let ranges = if text.chars().count() <= self.chunk_size {
            vec![0..text.len()]
        } else {
            let mut out = Vec::new();
            self.split_range(text, 0..text.len(), &self.separators, &mut out);
            out
        };

        ranges
            .into_iter()
            .map(|range| to_output(text, range))
            .collect()
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&'static str],
        out: &mut Vec<Range<usize>>,
    ) {
        let segment = &text[range.clone()];

        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&'static str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if segment.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<Range<usize>> = Vec::new();
        for piece in split_keeping_separator(segment, separator, range.start) {
            if char_len(text, &piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                self.merge(text, &good, out);
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece);
            } else {
                self.split_range(text, piece, remaining, out);
            }
        }
        if !good.is_empty() {
            self.merge(text, &good, out);
        }
    }

    /// Greedily merge adjacent pieces into chunks of at most `chunk_size`
    /// characters, carrying trailing pieces forward as overlap.
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(text, piece);
            if total + len > self.chunk_size && !current.is_empty() {
                push_joined(text, &current, out);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, first_len)) => total -= first_len,
                        None => break,
                    }
                }
            }
            current.push_back((piece.clone(), len));
            total += len;
        }
        push_joined(text, &current, out);
    }
}

/// Pieces of `segment` split at every occurrence of `separator`, each
/// separator staying attached to the piece that follows it. Offsets are
/// shifted by `base` so they index the full text.
fn split_keeping_separator(segment: &str, separator: &str, base: usize) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in segment.match_indices(separator) {
        if idx > start {
            pieces.push(base + start..base + idx);
        }
        start = idx;
    }
    if start < segment.len() {
        pieces.push(base + start..base + segment.len());
    }
    pieces
}

fn push_joined(text: &str, current: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    let (Some((first, _)), Some((last, _))) = (current.front(), current.back()) else {
        return;
    };
    let joined = first.start..last.end;
    if !text[joined.clone()].trim().is_empty() {
        out.push(joined);
    }
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

/// Line numbers refer to the first and last non-newline characters of the chunk.
fn to_output(text: &str, range: Range<usize>) -> ChunkOutput {
    let body = &text[range.clone()];
    let leading = body.len() - body.trim_start_matches('\n').len();
    let start_line = 1 + text[..range.start + leading].matches('\n').count();
    let inner = body[leading..].trim_end_matches('\n');
    let end_line = start_line + inner.matches('\n').count();

    ChunkOutput {
        content: body.to_string(),
        start_offset: range.start,
        start_line,
        end_line,
    }
}
