//! In-memory vector index with SQLite persistence.
//!
//! The index holds chunks and their embedding vectors in insertion order and
//! answers top-k cosine-similarity searches. It persists to a single SQLite
//! file (`index.sqlite`) inside the index directory; writes go to a temp
//! file that is renamed into place, so a crash mid-save never leaves a
//! half-written store where the real one should be.
//!
//! The store records the embedding model that produced its vectors. Loading
//! with a different configured model fails, since similarity between vectors
//! from different models is meaningless.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

/// File name of the store inside the index directory.
pub const STORE_FILE: &str = "index.sqlite";

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// An immutable, insertion-ordered vector index.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<Entry>,
    model: String,
    dims: usize,
}

impl VectorIndex {
    /// Build an index from parallel chunk and vector lists.
    ///
    /// The lists must have equal length and every vector must have the same
    /// dimensionality; chunks keep their given order.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, model: &str) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::CorruptIndex(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dims {
                return Err(RagError::CorruptIndex(format!(
                    "vector {} has {} dimensions, expected {}",
                    i,
                    vector.len(),
                    dims
                )));
            }
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Entry { chunk, vector })
            .collect();

        Ok(Self { entries, model: model.to_string(), dims })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding model that produced the stored vectors.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Dimensionality of the stored vectors.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return the `k` most similar chunks to `query`, best first.
    ///
    /// Scores are cosine similarities. Ties keep insertion order (the sort
    /// is stable), and at most `min(k, len)` results come back.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Persist the index to `<dir>/index.sqlite`, atomically.
    ///
    /// The store is written to a temp file first and renamed over the final
    /// path once complete.
    pub async fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| store_error(format!("failed to create {}: {e}", dir.display())))?;

        let final_path = dir.join(STORE_FILE);
        let tmp_path = dir.join(format!("{STORE_FILE}.tmp"));
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)
                .map_err(|e| store_error(format!("failed to clear stale temp store: {e}")))?;
        }

        let pool = open_pool(&tmp_path, true).await?;
        let result = self.write_store(&pool).await;
        pool.close().await;
        result?;

        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| store_error(format!("failed to move store into place: {e}")))?;
        Ok(())
    }

    async fn write_store(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                entry_count INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                position INTEGER PRIMARY KEY,
                chunk_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO index_meta (id, model, dims, entry_count, created_at) \
             VALUES (1, ?, ?, ?, ?)",
        )
        .bind(&self.model)
        .bind(self.dims as i64)
        .bind(self.entries.len() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .map_err(db_error)?;

        for (position, entry) in self.entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO entries \
                 (position, chunk_id, document_id, chunk_index, text, start_offset, end_offset, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.chunk.id)
            .bind(&entry.chunk.document_id)
            .bind(entry.chunk.index as i64)
            .bind(&entry.chunk.text)
            .bind(entry.chunk.start_offset as i64)
            .bind(entry.chunk.end_offset as i64)
            .bind(vec_to_blob(&entry.vector))
            .execute(pool)
            .await
            .map_err(db_error)?;
        }

        Ok(())
    }

    /// Load a persisted index from `<dir>/index.sqlite`.
    ///
    /// Fails with [`RagError::NotFound`] if the store file does not exist,
    /// [`RagError::Configuration`] if `expected_model` does not match the
    /// model recorded in the store, and [`RagError::CorruptIndex`] if the
    /// store is unreadable or internally inconsistent. Never returns a
    /// partially loaded index.
    pub async fn load(dir: &Path, expected_model: &str) -> Result<Self> {
        let path = dir.join(STORE_FILE);
        if !path.exists() {
            return Err(RagError::NotFound(path));
        }

        let pool = open_pool(&path, false).await?;
        let result = Self::read_store(&pool, expected_model).await;
        pool.close().await;
        result
    }

    async fn read_store(pool: &SqlitePool, expected_model: &str) -> Result<Self> {
        let meta = sqlx::query("SELECT model, dims, entry_count FROM index_meta WHERE id = 1")
            .fetch_optional(pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| RagError::CorruptIndex("store has no metadata row".to_string()))?;

        let model: String = meta.get("model");
        let dims: i64 = meta.get("dims");
        let entry_count: i64 = meta.get("entry_count");

        if model != expected_model {
            return Err(RagError::Configuration(format!(
                "index was built with embedding model '{model}' but '{expected_model}' is \
                 configured; rebuild the index or change the configured model"
            )));
        }

        let rows = sqlx::query(
            "SELECT chunk_id, document_id, chunk_index, text, start_offset, end_offset, embedding \
             FROM entries ORDER BY position",
        )
        .fetch_all(pool)
        .await
        .map_err(db_error)?;

        if rows.len() as i64 != entry_count {
            return Err(RagError::CorruptIndex(format!(
                "store metadata claims {entry_count} entries but {} are present",
                rows.len()
            )));
        }

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            if vector.len() != dims as usize {
                return Err(RagError::CorruptIndex(format!(
                    "entry {} has a {}-dimensional vector, expected {dims}",
                    row.get::<String, _>("chunk_id"),
                    vector.len()
                )));
            }

            entries.push(Entry {
                chunk: Chunk {
                    id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    index: row.get::<i64, _>("chunk_index") as usize,
                    text: row.get("text"),
                    start_offset: row.get::<i64, _>("start_offset") as usize,
                    end_offset: row.get::<i64, _>("end_offset") as usize,
                },
                vector,
            });
        }

        Ok(Self { entries, model, dims: dims as usize })
    }

    /// Whether a persisted store exists under `dir`.
    pub fn store_exists(dir: &Path) -> bool {
        dir.join(STORE_FILE).exists()
    }
}

async fn open_pool(path: &PathBuf, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| store_error(format!("failed to open store {}: {e}", path.display())))
}

fn db_error(e: sqlx::Error) -> RagError {
    RagError::CorruptIndex(format!("database error: {e}"))
}

fn store_error(message: String) -> RagError {
    RagError::CorruptIndex(message)
}
