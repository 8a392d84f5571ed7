use std::sync::Arc;
use tracing::debug;

use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;
use crate::store::DocumentStore;

/// Query-phase retrieval: embed the question, find the nearest chunks in
/// the index, resolve them to stored content.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    store: Arc<DocumentStore>,
}

impl Retriever {
    /// The embedder must be the one the index was built with; anything
    /// else shows up as a dimension mismatch at query time.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        store: Arc<DocumentStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
        }
    }

    /// Top-k chunks by ascending distance from the query embedding.
    ///
    /// A chunk id present in the index but absent from the store means the
    /// two artifacts are out of sync; that fails loudly instead of being
    /// skipped.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_vector, k)?;
        debug!("query matched {} chunks", hits.len());

        let mut retrieved = Vec::with_capacity(hits.len());
        for (chunk_id, distance) in hits {
            let chunk = self.store.get_chunk(&chunk_id).await.map_err(|err| {
                if matches!(err, Error::NotFound(_)) {
                    Error::NotFound(format!(
                        "chunk {chunk_id} is referenced by the index but missing from the store"
                    ))
                } else {
                    err
                }
            })?;
            retrieved.push(RetrievedChunk { chunk, distance });
        }
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TokenChunker;
    use crate::indexer::Indexer;
    use crate::models::Document;

    /// Maps each known text to a fixed point on a line, so distances from
    /// the query are known in advance.
    pub(crate) struct LineEmbedder;

    #[async_trait::async_trait]
    impl Embedder for LineEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let x = match text {
                "alpha beta" => 1.0,
                "beta gamma" => 2.0,
                "delta" => 5.0,
                _ => 0.0, // queries and the dimension probe
            };
            Ok(vec![x, 0.0])
        }
    }

    async fn built_fixture() -> (Arc<VectorIndex>, Arc<DocumentStore>) {
        let store = Arc::new(DocumentStore::open_in_memory().await.unwrap());
        let documents = vec![
            Document::new("a.md", "alpha beta"),
            Document::new("b.md", "beta gamma"),
            Document::new("c.md", "delta"),
        ];

        let indexer = Indexer::new(
            Arc::new(TokenChunker::new().unwrap()),
            Arc::new(LineEmbedder),
            128,
            0,
            1,
        );
        let index = Arc::new(indexer.build(&documents, &store).await.unwrap());
        (index, store)
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_distance() {
        let (index, store) = built_fixture().await;
        let retriever = Retriever::new(Arc::new(LineEmbedder), index, store);

        let retrieved = retriever.retrieve("anything", 2).await.unwrap();

        assert_eq!(retrieved.len(), 2);
        assert_eq!(retrieved[0].chunk.document_id, "a.md");
        assert_eq!(retrieved[0].chunk.content, "alpha beta");
        assert_eq!(retrieved[1].chunk.document_id, "b.md");
        assert!(retrieved[0].distance < retrieved[1].distance);
    }

    #[tokio::test]
    async fn test_retrieve_more_than_stored_returns_all() {
        let (index, store) = built_fixture().await;
        let retriever = Retriever::new(Arc::new(LineEmbedder), index, store);

        let retrieved = retriever.retrieve("anything", 10).await.unwrap();
        assert_eq!(retrieved.len(), 3);
    }

    #[tokio::test]
    async fn test_index_store_mismatch_is_fatal() {
        let store = Arc::new(DocumentStore::open_in_memory().await.unwrap());
        let mut index = VectorIndex::new(2).unwrap();
        index
            .insert("ghost#000000".to_string(), vec![0.0, 0.0])
            .unwrap();

        let retriever = Retriever::new(Arc::new(LineEmbedder), Arc::new(index), store);
        let err = retriever.retrieve("anything", 1).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("ghost#000000"));
    }
}
