use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::EmbeddingCache;
use crate::error::{Error, Result};

/// Capability interface for turning text into fixed-dimension vectors.
///
/// The dimension is fixed per instance but not known a priori; callers
/// discover it from the first embedding they request.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embedding, semantically equivalent to per-item `embed`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Client for the Gemini embedding endpoint, with optional content-hash
/// caching.
pub struct GeminiEmbedder {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    cache: Option<Arc<EmbeddingCache>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<BatchEmbedItem<'a>>,
}

#[derive(Serialize)]
struct BatchEmbedItem<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_url: String, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repoqa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            cache: None,
        })
    }

    /// Enable caching with the given cache instance
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Call the embedding endpoint, bypassing the cache.
    async fn embed_uncached(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.api_url, self.model
        );
        let request = EmbedContentRequest {
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("failed to call embedding endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {e}")))?;

        if parsed.embedding.values.is_empty() {
            return Err(Error::Embedding("empty embedding in response".to_string()));
        }
        Ok(parsed.embedding.values)
    }
}

#[async_trait::async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(vector) = cache.get(text).await? {
                return Ok(vector);
            }
        }

        let vector = self.embed_uncached(text).await?;

        if let Some(cache) = &self.cache {
            cache.put(text, &vector).await?;
        }

        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // With a cache, per-item embedding lets each text hit it; the batch
        // endpoint is only a win for cold corpora.
        if self.cache.is_some() {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            return Ok(vectors);
        }

        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.api_url, self.model
        );
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| BatchEmbedItem {
                    model: format!("models/{}", self.model),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("failed to call embedding endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "batch embedding returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}
