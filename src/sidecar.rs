//! Sidecar embedding store.
//!
//! One row per document, holding the derived vector together with the
//! fingerprint of the content it was computed from. The pair lives in a
//! single row, so hash and vector can never be written separately. Upsert
//! semantics make redelivered or duplicate jobs harmless.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::SidecarEmbedding;

/// Insert or overwrite the embedding for a document.
pub async fn upsert_embedding(
    pool: &SqlitePool,
    document_id: &str,
    content_hash: &str,
    vector: &[f32],
) -> Result<()> {
    let blob = vec_to_blob(vector);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO embeddings (document_id, content_hash, dims, vector, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(document_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            dims = excluded.dims,
            vector = excluded.vector,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(document_id)
    .bind(content_hash)
    .bind(vector.len() as i64)
    .bind(&blob)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_embedding(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Option<SidecarEmbedding>> {
    let row = sqlx::query(
        "SELECT document_id, content_hash, dims, vector, updated_at
         FROM embeddings WHERE document_id = ?",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let blob: Vec<u8> = row.get("vector");
        SidecarEmbedding {
            document_id: row.get("document_id"),
            content_hash: row.get("content_hash"),
            dims: row.get("dims"),
            vector: blob_to_vec(&blob),
            updated_at: row.get("updated_at"),
        }
    }))
}

pub async fn count_embeddings(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
