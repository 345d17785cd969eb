//! The two RAG flows: indexing a cloned repository into its collection, and
//! answering questions from that collection.

pub mod indexing;
pub mod query;

pub use indexing::{IndexError, Indexer};
pub use query::{QueryEngine, QueryError};
