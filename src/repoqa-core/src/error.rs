/// Errors surfaced by the retrieval engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or inconsistent index parameters (zero dimension, an
    /// embedder changing its output length mid-build, a malformed index
    /// file).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A vector handed to the index does not match its dimension.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Missing index file, chunk or document.
    #[error("not found: {0}")]
    NotFound(String),

    /// Failure reported by the embedding provider.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Failure reported by the generation provider.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Failure reported by the document source.
    #[error("document source error: {0}")]
    Source(String),

    /// Tokenizer or chunking failure.
    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
