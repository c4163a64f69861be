//! Source document store operations.
//!
//! Documents are written by external callers (CLI or embedding hosts); the
//! pipeline itself only reads them. Every content write recomputes the stored
//! fingerprint, and a committed content change fires the fast-path enqueue so
//! regeneration does not have to wait for the next stale scan.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::enqueue;
use crate::errlog;
use crate::fingerprint::fingerprint;
use crate::models::Document;

/// Insert or update a document. Bumps `updated_at` on every call; fires the
/// mutation hook only when the content fingerprint actually changed (metadata
/// writes leave the derived embedding fresh).
pub async fn put_document(
    pool: &SqlitePool,
    config: &Config,
    id: &str,
    content: &str,
    metadata_json: Option<&str>,
) -> Result<Document> {
    let hash = fingerprint(content);
    let now = chrono::Utc::now().timestamp();
    let metadata = metadata_json.unwrap_or("{}");

    let previous_hash: Option<String> =
        sqlx::query_scalar("SELECT content_hash FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, content, metadata_json, content_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            content = excluded.content,
            metadata_json = excluded.metadata_json,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(content)
    .bind(metadata)
    .bind(&hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let content_changed = previous_hash.as_deref() != Some(hash.as_str());
    if content_changed && !content.is_empty() {
        // Fast path. A failure here is non-fatal: the stale scan converges
        // the document on a later tick.
        if let Err(e) = enqueue::enqueue_for_document(pool, config, id, content).await {
            errlog::record_error(
                pool,
                Some(id),
                &format!("Fast-path enqueue failed: {}", e),
                serde_json::json!({ "content_length": content.len() }),
                "put_document",
                None,
            )
            .await;
        }
    } else {
        debug!(document_id = id, "content unchanged, no enqueue");
    }

    get_document(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document vanished after upsert: {}", id))
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, content, metadata_json, content_hash, created_at, updated_at
         FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Document {
        id: row.get("id"),
        content: row.get("content"),
        metadata_json: row.get("metadata_json"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Delete a document. The sidecar embedding goes with it (FK cascade).
/// Returns false when the id was unknown.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_documents(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
