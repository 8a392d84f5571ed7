//! repoqa Core Library
//!
//! This crate provides the retrieval engine behind repoqa, including:
//! - Document chunking and embedding
//! - Flat exact nearest-neighbor vector index with file persistence
//! - SQLite document store
//! - Retrieval and answer generation over pluggable model providers
//! - GitHub document source

pub mod cache;
pub mod chunking;
pub mod config;
pub mod embedder;
pub mod error;
pub mod generator;
pub mod index;
pub mod indexer;
pub mod models;
pub mod query;
pub mod retriever;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use cache::EmbeddingCache;
pub use chunking::{Chunker, TokenChunker};
pub use config::Config;
pub use embedder::{Embedder, GeminiEmbedder};
pub use error::{Error, Result};
pub use generator::{GeminiGenerator, Generator};
pub use index::VectorIndex;
pub use indexer::Indexer;
pub use models::*;
pub use query::QueryEngine;
pub use retriever::Retriever;
pub use source::{DocumentSource, GithubSource};
pub use store::DocumentStore;
