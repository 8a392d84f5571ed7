use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Key-value persistence for documents and their chunks.
///
/// Pure lookup storage: all similarity search happens in the vector index,
/// which references chunks stored here by id. Backed by SQLite so a loaded
/// index finds its chunk content across process restarts.
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    /// Open (or create) the store at the given database path.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite://{path}?mode=rwc")).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests and offline examples.
    ///
    /// Pinned to one connection: each in-memory SQLite connection is its
    /// own database, so a pool of them would not share the schema.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Connection pool handle, shared with the embedding cache so both
    /// live in one database file.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store a document
    pub async fn put_document(&self, document: &Document) -> Result<()> {
        let metadata_json = serde_json::to_string(&document.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, content, metadata, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata = excluded.metadata
            "#,
        )
        .bind(&document.id)
        .bind(&document.content)
        .bind(&metadata_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a chunk
    pub async fn put_chunk(&self, chunk: &Chunk) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, content, start_offset, chunk_index, token_count)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                content = excluded.content,
                start_offset = excluded.start_offset,
                chunk_index = excluded.chunk_index,
                token_count = excluded.token_count
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(&chunk.content)
        .bind(chunk.offset as i64)
        .bind(chunk.index as i64)
        .bind(chunk.token_count as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a chunk by id
    pub async fn get_chunk(&self, id: &str) -> Result<Chunk> {
        let row = sqlx::query(
            r#"
            SELECT id, document_id, content, start_offset, chunk_index, token_count
            FROM chunks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("chunk {id}")))?;

        Ok(Chunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            content: row.get("content"),
            offset: row.get::<i64, _>("start_offset") as usize,
            index: row.get::<i64, _>("chunk_index") as usize,
            token_count: row.get::<i64, _>("token_count") as usize,
        })
    }

    /// Get a document by id
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        let row = sqlx::query("SELECT id, content, metadata FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {id}")))?;

        let metadata_json: Option<String> = row.get("metadata");
        let metadata: HashMap<String, String> = metadata_json
            .map(|json| serde_json::from_str(&json).unwrap_or_default())
            .unwrap_or_default();

        Ok(Document {
            id: row.get("id"),
            content: row.get("content"),
            metadata,
        })
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Remove every document and chunk, leaving the schema in place.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_round_trip() {
        let store = DocumentStore::open_in_memory().await.unwrap();

        let document = Document::new("src/main.rs", "fn main() {}")
            .with_metadata("path", "src/main.rs")
            .with_metadata("branch", "main");
        store.put_document(&document).await.unwrap();

        let loaded = store.get_document("src/main.rs").await.unwrap();
        assert_eq!(loaded.content, "fn main() {}");
        assert_eq!(loaded.metadata.get("branch").unwrap(), "main");
    }

    #[tokio::test]
    async fn test_chunk_round_trip() {
        let store = DocumentStore::open_in_memory().await.unwrap();

        let chunk = Chunk {
            id: Chunk::chunk_id("src/main.rs", 2),
            document_id: "src/main.rs".to_string(),
            content: "some chunk text".to_string(),
            offset: 120,
            index: 2,
            token_count: 4,
        };
        store.put_chunk(&chunk).await.unwrap();

        let loaded = store.get_chunk(&chunk.id).await.unwrap();
        assert_eq!(loaded, chunk);
    }

    #[tokio::test]
    async fn test_missing_chunk_is_not_found() {
        let store = DocumentStore::open_in_memory().await.unwrap();
        let err = store.get_chunk("nope#000000").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = DocumentStore::open_in_memory().await.unwrap();
        let err = store.get_document("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_empties_the_store() {
        let store = DocumentStore::open_in_memory().await.unwrap();

        store
            .put_document(&Document::new("a.rs", "text"))
            .await
            .unwrap();
        store
            .put_chunk(&Chunk {
                id: Chunk::chunk_id("a.rs", 0),
                document_id: "a.rs".to_string(),
                content: "text".to_string(),
                offset: 0,
                index: 0,
                token_count: 1,
            })
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);
        assert!(store.get_document("a.rs").await.is_err());
    }
}
