use chrono::Utc;
use lru::LruCache;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::num::NonZeroUsize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::index::{vector_from_bytes, vector_to_bytes};

/// Cache key: SHA-256 over the model name and the text, so switching
/// embedding models never serves stale vectors.
fn cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Embedding cache: in-memory LRU tier over a SQLite table.
///
/// Rebuilding an index over a mostly unchanged corpus hits this instead of
/// the embedding endpoint for every chunk whose text did not change.
pub struct EmbeddingCache {
    memory: RwLock<LruCache<String, Vec<f32>>>,
    pool: SqlitePool,
    model: String,
}

impl EmbeddingCache {
    pub async fn new(pool: SqlitePool, model: String, memory_entries: usize) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_cache (
                key TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let capacity = NonZeroUsize::new(memory_entries).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            memory: RwLock::new(LruCache::new(capacity)),
            pool,
            model,
        })
    }

    /// Lookup order: memory, then disk (promoting to memory), then miss.
    pub async fn get(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let key = cache_key(&self.model, text);

        if let Some(vector) = self.memory.write().await.get(&key) {
            debug!("cache hit (memory): {}", &key[..8]);
            return Ok(Some(vector.clone()));
        }

        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT vector FROM embedding_cache WHERE key = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((bytes,)) => {
                let vector = vector_from_bytes(&bytes);
                self.memory.write().await.put(key, vector.clone());
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    /// Store an embedding in both tiers.
    pub async fn put(&self, text: &str, vector: &[f32]) -> Result<()> {
        let key = cache_key(&self.model, text);

        sqlx::query(
            r#"
            INSERT INTO embedding_cache (key, vector, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                vector = excluded.vector,
                created_at = excluded.created_at
            "#,
        )
        .bind(&key)
        .bind(vector_to_bytes(vector))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.memory.write().await.put(key, vector.to_vec());
        Ok(())
    }
}
