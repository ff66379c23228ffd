// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding cache tables.
//!
//! Product vectors are keyed by `(product_id, model)` and carry the hash of the
//! document text they were computed from. Knowledge vectors are keyed by
//! `(kb_hash, model)` so the key is the content hash.

use concierge_core::{CacheNamespace, CachedEmbedding, ConciergeError};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to an f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Look up a cached vector.
pub async fn get_cached(
    db: &Database,
    namespace: CacheNamespace,
    key: &str,
    model: &str,
) -> Result<Option<CachedEmbedding>, ConciergeError> {
    let key = key.to_string();
    let model = model.to_string();
    db.connection()
        .call(move |conn| {
            let row = match namespace {
                CacheNamespace::Product => conn
                    .query_row(
                        "SELECT doc_hash, vector FROM product_embeddings \
                         WHERE product_id = ?1 AND model = ?2",
                        params![key, model],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
                    )
                    .optional()?,
                CacheNamespace::Knowledge => conn
                    .query_row(
                        "SELECT kb_hash, vector FROM kb_embeddings WHERE kb_hash = ?1 AND model = ?2",
                        params![key, model],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
                    )
                    .optional()?,
            };
            Ok(row.map(|(content_hash, blob)| CachedEmbedding {
                content_hash,
                vector: blob_to_vec(&blob),
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a cached vector.
pub async fn put_cached(
    db: &Database,
    namespace: CacheNamespace,
    key: &str,
    model: &str,
    entry: &CachedEmbedding,
) -> Result<(), ConciergeError> {
    let key = key.to_string();
    let model = model.to_string();
    let content_hash = entry.content_hash.clone();
    let dim = entry.vector.len() as i64;
    let blob = vec_to_blob(&entry.vector);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            match namespace {
                CacheNamespace::Product => conn.execute(
                    "INSERT INTO product_embeddings (product_id, model, doc_hash, dim, vector, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(product_id, model) DO UPDATE SET \
                     doc_hash = excluded.doc_hash, dim = excluded.dim, \
                     vector = excluded.vector, updated_at = excluded.updated_at",
                    params![key, model, content_hash, dim, blob, now],
                )?,
                CacheNamespace::Knowledge => conn.execute(
                    "INSERT OR REPLACE INTO kb_embeddings (kb_hash, model, dim, vector, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![key, model, dim, blob, now],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
