//! Stale-set detection.
//!
//! Joins the document store against the sidecar and returns records whose
//! stored fingerprint is missing or no longer matches. Most-recently-mutated
//! documents come first so a bounded batch spends its budget where it matters
//! most under load. The query is a plain bounded SELECT, re-invocable with
//! the same limit any number of times; not a live cursor.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::StaleDocument;

/// Find up to `limit` documents whose embedding must be regenerated.
/// Only documents with non-empty content are eligible.
pub async fn find_stale(pool: &SqlitePool, limit: i64) -> Result<Vec<StaleDocument>> {
    let rows = sqlx::query(
        r#"
        SELECT
            d.id,
            d.content,
            d.content_hash AS current_hash,
            e.content_hash AS stored_hash,
            LENGTH(d.content) AS content_length
        FROM documents d
        LEFT JOIN embeddings e ON e.document_id = d.id
        WHERE d.content != ''
          AND (e.document_id IS NULL OR e.content_hash != d.content_hash)
        ORDER BY d.updated_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let results = rows
        .iter()
        .map(|row| StaleDocument {
            id: row.get("id"),
            content: row.get("content"),
            current_hash: row.get("current_hash"),
            stored_hash: row.get("stored_hash"),
            content_length: row.get("content_length"),
        })
        .collect();

    Ok(results)
}

/// Count of stale documents, for the monitoring surface.
pub async fn count_stale(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM documents d
        LEFT JOIN embeddings e ON e.document_id = d.id
        WHERE d.content != ''
          AND (e.document_id IS NULL OR e.content_hash != d.content_hash)
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
