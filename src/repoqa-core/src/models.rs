use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of source content loaded from a document source.
///
/// `id` is a stable identifier (the repository-relative file path for
/// GitHub sources). Documents are immutable once loaded; re-indexing a
/// corpus rebuilds everything derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded slice of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique within the corpus; derived from the parent id and position.
    pub id: String,
    pub document_id: String,
    pub content: String,
    /// Character offset of this chunk's start within the parent document.
    pub offset: usize,
    /// Position of this chunk in the parent's chunk sequence.
    pub index: usize,
    pub token_count: usize,
}

impl Chunk {
    /// Chunk ids sort by parent id, then by position within the parent.
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{document_id}#{index:06}")
    }
}

/// A chunk returned by retrieval, with its distance from the query
/// embedding (smaller is closer).
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub distance: f32,
}
