//! Offline Pipeline Example
//!
//! Runs the whole build-then-query pipeline without any network access,
//! using a deterministic stub embedder and a template generator.
//!
//! Run with: cargo run --example offline_pipeline

use repoqa_core::*;
use std::sync::Arc;

/// Embeds text as normalized letter frequencies. Deterministic and
/// offline; close enough to cluster texts that share vocabulary.
struct LetterFrequencyEmbedder;

#[async_trait::async_trait]
impl Embedder for LetterFrequencyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 26];
        let mut total = 0.0f32;
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
            total += 1.0;
        }
        if total > 0.0 {
            for v in &mut vector {
                *v /= total;
            }
        }
        Ok(vector)
    }
}

/// Answers by describing the prompt instead of calling a model.
struct TemplateGenerator;

#[async_trait::async_trait]
impl Generator for TemplateGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!(
            "(offline) I would answer from a prompt of {} characters here.",
            prompt.len()
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("repoqa Offline Pipeline Example\n");

    let documents = vec![
        Document::new("docs/install.md", "Install the tool with cargo install repoqa.")
            .with_metadata("branch", "main"),
        Document::new("docs/config.md", "Configuration lives in config.json next to the binary.")
            .with_metadata("branch", "main"),
        Document::new("src/lib.rs", "pub fn answer(question: &str) -> String { todo!() }")
            .with_metadata("branch", "main"),
    ];

    let store = Arc::new(DocumentStore::open_in_memory().await?);
    let embedder: Arc<dyn Embedder> = Arc::new(LetterFrequencyEmbedder);

    // Build: chunk, embed, index
    let indexer = Indexer::new(Arc::new(TokenChunker::new()?), embedder.clone(), 128, 16, 2);
    let index = Arc::new(indexer.build(&documents, &store).await?);
    println!("✅ Built index: {} entries, dimension {}\n", index.len(), index.dimension());

    // Retrieve the chunks closest to a question
    let retriever = Retriever::new(embedder.clone(), index.clone(), store.clone());
    let question = "How do I install this?";
    let retrieved = retriever.retrieve(question, 2).await?;

    println!("🔍 Top chunks for {question:?}:");
    for (i, hit) in retrieved.iter().enumerate() {
        println!(
            "   {}. {} (distance: {:.4})",
            i + 1,
            hit.chunk.document_id,
            hit.distance
        );
        println!("      {}", hit.chunk.content);
    }

    // Full retrieve-then-generate round
    let retriever = Retriever::new(embedder, index, store);
    let engine = QueryEngine::new(retriever, Arc::new(TemplateGenerator), 2);
    let answer = engine.answer(question).await?;
    println!("\n💬 {answer}");

    Ok(())
}
