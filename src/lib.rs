//! # source-chat
//!
//! Clone a GitHub repository, index its source files into a per-repository
//! vector collection, and answer natural-language questions about the code.
//!
//! ## Architecture
//!
//! ```text
//!   POST /repos/clone          POST /repos/{id}/process          POST /repos/{id}/chat
//!          │                            │                                 │
//!          ▼                            ▼                                 ▼
//!   ┌──────────────┐   ┌──────────────────────────────┐   ┌──────────────────────────┐
//!   │ RepoFetcher  │   │ Indexer                      │   │ QueryEngine              │
//!   │ origin check │   │ FileSelector → read (UTF-8)  │   │ embed question           │
//!   │ git clone    │──▶│ → TextSplitter (2000 / 200)  │──▶│ top-5 cosine search      │
//!   │ size ceiling │   │ → Embedder → Collection      │   │ prompt → Completer       │
//!   └──────────────┘   └──────────────────────────────┘   └──────────────────────────┘
//!    repos/<id>/         vectordb/repo_<id>.json             {answer, sources}
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, and LLM settings
//! - [`models`] - Repository identifiers, documents, chunks, request/response types
//! - [`git`] - Cloning with origin and size rules, and file selection
//! - [`chunking`] - Recursive character splitting with overlap
//! - [`search::vector`] - Per-repository vector collections with cosine similarity and disk persistence
//! - [`llm`] - Embedding and completion via OpenAI or Ollama
//! - [`pipeline`] - The indexing and question-answering flows
//! - [`api`] - Axum HTTP handlers
//! - [`error`] - HTTP error mapping
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
