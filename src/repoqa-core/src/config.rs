use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Repository to index, e.g. "https://github.com/owner/repo".
    #[serde(default)]
    pub repository: String,

    /// Branch to index; resolved from the repository's default branch
    /// when unset.
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "default_index_path")]
    pub index_path: String,

    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// File extensions (without the leading dot) included in the corpus.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Concurrent embedding requests during the build phase.
    #[serde(default = "default_num_workers")]
    pub num_embedding_workers: usize,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_index_path() -> String {
    "./data/index.bin".to_string()
}

fn default_store_path() -> String {
    "./data/store.db".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["rs".to_string(), "py".to_string(), "md".to_string()]
}

fn default_top_k() -> usize {
    4
}

fn default_num_workers() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    64
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// In-memory LRU capacity; the disk tier is unbounded.
    #[serde(default = "default_cache_memory_entries")]
    pub memory_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_memory_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            memory_entries: default_cache_memory_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_api_url")]
    pub api_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_generation_model")]
    pub generation_model: String,
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

fn default_generation_model() -> String {
    "gemini-flash-latest".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: default_gemini_api_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: String::new(),
            branch: None,
            index_path: default_index_path(),
            store_path: default_store_path(),
            extensions: default_extensions(),
            top_k: default_top_k(),
            num_embedding_workers: default_num_workers(),
            chunking: ChunkingConfig::default(),
            cache: CacheConfig::default(),
            github: GithubConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"repository": "https://github.com/owner/repo"}"#).unwrap();
        assert_eq!(config.repository, "https://github.com/owner/repo");
        assert_eq!(config.branch, None);
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 64);
        assert_eq!(config.top_k, 4);
        assert!(config.cache.enabled);
        assert_eq!(config.gemini.embedding_model, "gemini-embedding-001");
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "repository": "https://github.com/owner/repo",
                "branch": "develop",
                "top_k": 8,
                "chunking": {"chunk_size": 128, "chunk_overlap": 16}
            }"#,
        )
        .unwrap();
        assert_eq!(config.branch.as_deref(), Some("develop"));
        assert_eq!(config.top_k, 8);
        assert_eq!(config.chunking.chunk_size, 128);
        assert_eq!(config.chunking.chunk_overlap, 16);
    }
}
