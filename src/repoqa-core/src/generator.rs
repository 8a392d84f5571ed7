use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Capability interface for producing a natural-language answer from an
/// assembled prompt.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Client for the Gemini text generation endpoint.
pub struct GeminiGenerator {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
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
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GeminiGenerator {
    pub fn new(api_url: String, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repoqa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait::async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("failed to call generation endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "generation endpoint returned {status}: {body}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("failed to parse generation response: {e}")))?;

        let answer: String = parsed
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect()
            })
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(Error::Generation("no candidates in response".to_string()));
        }
        Ok(answer)
    }
}
