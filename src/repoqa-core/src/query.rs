use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::generator::Generator;
use crate::models::RetrievedChunk;
use crate::retriever::Retriever;

/// End-to-end question answering over a built index.
///
/// Safe to call repeatedly against the same index; each call is one
/// retrieve-then-generate round with no retry logic of its own.
pub struct QueryEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k: top_k.max(1),
        }
    }

    /// Answer a question from the top-k retrieved chunks. The generator's
    /// output is returned verbatim.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let retrieved = self.retriever.retrieve(question, self.top_k).await?;
        let prompt = build_prompt(question, &retrieved);
        debug!("assembled prompt with {} context blocks", retrieved.len());
        self.generator.generate(&prompt).await
    }
}

/// Numbered context blocks, each labeled with its source location, then
/// the question. The labels keep retrieved text clearly separated from
/// the instruction and from each other.
fn build_prompt(question: &str, retrieved: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(
        "You are answering questions about a source code repository. \
         Answer from the context below; say so if it is not sufficient.\n\n",
    );

    for (i, hit) in retrieved.iter().enumerate() {
        prompt.push_str(&format!(
            "--- Context [{}] (source: {}, chunk {}) ---\n{}\n\n",
            i + 1,
            hit.chunk.document_id,
            hit.chunk.index,
            hit.chunk.content
        ));
    }

    prompt.push_str(&format!("Question: {question}\nAnswer:"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TokenChunker;
    use crate::embedder::Embedder;
    use crate::error::Error;
    use crate::indexer::Indexer;
    use crate::models::Document;
    use crate::store::DocumentStore;
    use std::sync::Mutex;

    struct ZeroEmbedder;

    #[async_trait::async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Distances are driven purely by text length.
            Ok(vec![text.len() as f32, 0.0, 0.0])
        }
    }

    /// Records the prompt it was handed and answers with a fixed string.
    struct RecordingGenerator {
        prompt: Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            *self.prompt.lock().unwrap() = Some(prompt.to_string());
            Ok("the answer".to_string())
        }
    }

    async fn engine_fixture(
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> (QueryEngine, Vec<Document>) {
        let documents = vec![
            Document::new("guide.md", "install with cargo"),
            Document::new("api.md", "the server listens on port eight thousand"),
        ];

        let store = Arc::new(DocumentStore::open_in_memory().await.unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(ZeroEmbedder);
        let indexer = Indexer::new(
            Arc::new(TokenChunker::new().unwrap()),
            embedder.clone(),
            128,
            0,
            1,
        );
        let index = Arc::new(indexer.build(&documents, &store).await.unwrap());

        let retriever = Retriever::new(embedder, index, store);
        (QueryEngine::new(retriever, generator, top_k), documents)
    }

    #[tokio::test]
    async fn test_answer_passes_context_and_question_to_generator() {
        let generator = Arc::new(RecordingGenerator {
            prompt: Mutex::new(None),
        });
        let (engine, documents) = engine_fixture(generator.clone(), 2).await;

        let answer = engine.answer("Q").await.unwrap();
        assert_eq!(answer, "the answer");

        let prompt = generator.prompt.lock().unwrap().clone().unwrap();
        for document in &documents {
            assert!(
                prompt.contains(&document.content),
                "prompt is missing {:?}",
                document.content
            );
            assert!(prompt.contains(&document.id));
        }
        assert!(prompt.contains("Question: Q"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        struct FailingGenerator;

        #[async_trait::async_trait]
        impl Generator for FailingGenerator {
            async fn generate(&self, _prompt: &str) -> Result<String> {
                Err(Error::Generation("quota exceeded".to_string()))
            }
        }

        let (engine, _) = engine_fixture(Arc::new(FailingGenerator), 2).await;
        let err = engine.answer("Q").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_prompt_layout_orders_context_before_question() {
        let retrieved = vec![RetrievedChunk {
            chunk: crate::models::Chunk {
                id: "f.rs#000000".to_string(),
                document_id: "f.rs".to_string(),
                content: "fn f() {}".to_string(),
                offset: 0,
                index: 0,
                token_count: 4,
            },
            distance: 0.5,
        }];

        let prompt = build_prompt("what does f do?", &retrieved);
        let context_at = prompt.find("fn f() {}").unwrap();
        let question_at = prompt.find("Question: what does f do?").unwrap();
        assert!(context_at < question_at);
        assert!(prompt.ends_with("Answer:"));
    }
}
