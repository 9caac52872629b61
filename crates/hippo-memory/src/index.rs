//! Similarity lookup over embeddings owned by the external index.
//!
//! Vectors live in the `embeddings` table of the shared database file as
//! little-endian `f32` BLOBs. This engine only reads them (plus a small
//! writer used by tooling and tests); computing embeddings is out of scope.

use crate::store::{fmt_ts, sqlite_err, MemoryStore};
use chrono::Utc;
use hippo_types::error::HippoResult;
use hippo_types::record::RecordId;
use rusqlite::OptionalExtension;

/// Similarity contract of the embedding index.
pub trait SimilarityIndex: Send + Sync {
    /// The stored vector for a record, if the index has one.
    fn embedding_for(&self, id: &RecordId) -> HippoResult<Option<Vec<f32>>>;

    /// Similarity of two vectors in `[-1, 1]`.
    fn similarity(&self, query: &[f32], record: &[f32]) -> f32 {
        cosine_similarity(query, record)
    }
}

/// Index reader over the shared SQLite file.
#[derive(Clone)]
pub struct SqliteEmbeddingIndex {
    store: MemoryStore,
}

impl SqliteEmbeddingIndex {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Write or replace a record's vector.
    pub fn put_embedding(&self, id: &RecordId, embedding: &[f32]) -> HippoResult<()> {
        let bytes = embedding_to_bytes(embedding);
        let now = fmt_ts(Utc::now());
        self.store.write(|tx| {
            tx.execute(
                "INSERT INTO embeddings (record_id, vector, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_id) DO UPDATE SET vector = ?2, updated_at = ?3",
                rusqlite::params![id.as_str(), bytes, now],
            )
            .map_err(sqlite_err)?;
            Ok(())
        })
    }
}

impl SimilarityIndex for SqliteEmbeddingIndex {
    fn embedding_for(&self, id: &RecordId) -> HippoResult<Option<Vec<f32>>> {
        let bytes: Option<Vec<u8>> = self.store.read(|conn| {
            conn.query_row(
                "SELECT vector FROM embeddings WHERE record_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_err)
        })?;
        Ok(bytes.map(|b| embedding_from_bytes(&b)))
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Serialize an embedding for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Deserialize an embedding; a trailing partial value is ignored.
pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
