use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::chunking::Chunker;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::Document;
use crate::store::DocumentStore;

/// Probe text used to discover the embedding dimension when the corpus
/// produces no chunks.
const DIMENSION_PROBE: &str = "test";

/// Build-phase orchestrator: documents -> chunks -> vectors -> index + store.
pub struct Indexer {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
    workers: usize,
}

impl Indexer {
    pub fn new(
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
        workers: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            chunk_size,
            chunk_overlap,
            workers: workers.max(1),
        }
    }

    /// Chunk and embed every document, inserting vectors into a fresh
    /// index and content into the store.
    ///
    /// The index dimension comes from the first embedding; an embedding of
    /// any other length aborts the build. Nothing is written to disk here
    /// beyond the store rows - saving the index is the caller's decision
    /// once the build has succeeded.
    pub async fn build(&self, documents: &[Document], store: &DocumentStore) -> Result<VectorIndex> {
        let mut chunks = Vec::new();
        for document in documents {
            let doc_chunks = self
                .chunker
                .chunk(document, self.chunk_size, self.chunk_overlap)?;
            debug!("chunked {} into {} chunks", document.id, doc_chunks.len());
            store.put_document(document).await?;
            chunks.extend(doc_chunks);
        }

        info!(
            "chunked {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        if chunks.is_empty() {
            // Fix the dimension with a single probe call so the empty
            // index is still searchable.
            let probe = self.embedder.embed(DIMENSION_PROBE).await?;
            return VectorIndex::new(probe.len());
        }

        // Embed with bounded concurrency. `buffered` keeps completion
        // order aligned with chunk order, so the built index is
        // deterministic for a given corpus.
        let embeddings: Vec<Result<Vec<f32>>> = stream::iter(chunks.iter())
            .map(|chunk| {
                let embedder = self.embedder.clone();
                async move { embedder.embed(&chunk.content).await }
            })
            .buffered(self.workers)
            .collect()
            .await;

        let mut vectors = Vec::with_capacity(chunks.len());
        for embedding in embeddings {
            vectors.push(embedding?);
        }

        let dimension = vectors[0].len();
        info!("embedding dimension: {dimension}");
        let mut index = VectorIndex::new(dimension)?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(Error::Configuration(format!(
                    "embedder returned dimension {} for chunk {}, index expects {dimension}",
                    vector.len(),
                    chunk.id
                )));
            }
            index.insert(chunk.id.clone(), vector)?;
            store.put_chunk(chunk).await?;
        }

        info!("built index with {} entries", index.len());
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TokenChunker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as letter-frequency counts over a fixed alphabet.
    struct CountingEmbedder {
        dimension: usize,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut vector = vec![0.0; self.dimension];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % self.dimension] += byte as f32;
            }
            Ok(vector)
        }
    }

    /// Returns a longer vector on every call.
    struct GrowingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Embedder for GrowingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.0; n + 1])
        }
    }

    fn indexer(embedder: Arc<dyn Embedder>) -> Indexer {
        let chunker = Arc::new(TokenChunker::new().unwrap());
        Indexer::new(chunker, embedder, 64, 0, 2)
    }

    #[tokio::test]
    async fn test_build_populates_index_and_store() {
        let store = DocumentStore::open_in_memory().await.unwrap();
        let embedder = Arc::new(CountingEmbedder::new(8));
        let documents = vec![
            Document::new("a.rs", "alpha beta gamma"),
            Document::new("b.rs", "delta epsilon"),
        ];

        let index = indexer(embedder.clone())
            .build(&documents, &store)
            .await
            .unwrap();

        assert_eq!(index.dimension(), 8);
        assert_eq!(index.len(), 2);
        assert_eq!(store.chunk_count().await.unwrap(), 2);

        // Every indexed id resolves through the store.
        let query = embedder.embed("alpha").await.unwrap();
        for (chunk_id, _) in index.search(&query, 10).unwrap() {
            store.get_chunk(&chunk_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_builds_empty_index() {
        let store = DocumentStore::open_in_memory().await.unwrap();
        let embedder = Arc::new(CountingEmbedder::new(5));

        let index = indexer(embedder).build(&[], &store).await.unwrap();

        assert_eq!(index.dimension(), 5);
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 5], 3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inconsistent_embedding_dimension_aborts_build() {
        let store = DocumentStore::open_in_memory().await.unwrap();
        let embedder = Arc::new(GrowingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let documents = vec![
            Document::new("a.rs", "alpha"),
            Document::new("b.rs", "beta"),
        ];

        let err = indexer(embedder)
            .build(&documents, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_build() {
        struct FailingEmbedder;

        #[async_trait::async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(Error::Embedding("endpoint unavailable".to_string()))
            }
        }

        let store = DocumentStore::open_in_memory().await.unwrap();
        let documents = vec![Document::new("a.rs", "alpha")];

        let err = indexer(Arc::new(FailingEmbedder))
            .build(&documents, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
