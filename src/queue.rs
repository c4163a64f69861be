//! Durable job queue with visibility-timeout redelivery.
//!
//! Jobs live in the `jobs` table. A claim marks up to `batch_size` of the
//! oldest-visible jobs invisible until `now + visibility_timeout` in a single
//! atomic statement, so concurrent drainers can never double-claim. A job
//! that is neither archived nor re-claimed before its deadline becomes
//! visible again. That expiry is the queue's sole retry mechanism; the queue
//! itself enforces no retry cap.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

use crate::models::{Job, JobOrigin, JobPriority};

/// Durably persist a new job. Returns its queue-assigned `message_id`
/// (monotonically increasing).
pub async fn send(
    pool: &SqlitePool,
    document_id: &str,
    content_snapshot: &str,
    origin: JobOrigin,
    priority: JobPriority,
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO jobs (document_id, content_snapshot, origin, priority, enqueued_at, visible_at, read_count)
        VALUES (?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(document_id)
    .bind(content_snapshot)
    .bind(origin.as_str())
    .bind(priority.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Atomically claim up to `batch_size` of the oldest-visible jobs.
///
/// Claimed jobs become invisible until `now + visibility_timeout_secs` and
/// their `read_count` is incremented. Returns an empty vec when nothing is
/// visible, which is not an error.
pub async fn read(
    pool: &SqlitePool,
    visibility_timeout_secs: i64,
    batch_size: usize,
) -> Result<Vec<Job>> {
    let now = chrono::Utc::now().timestamp();
    let deadline = now + visibility_timeout_secs;

    let rows = sqlx::query(
        r#"
        UPDATE jobs
        SET visible_at = ?, read_count = read_count + 1
        WHERE message_id IN (
            SELECT message_id FROM jobs
            WHERE visible_at <= ?
            ORDER BY message_id
            LIMIT ?
        )
        RETURNING message_id, document_id, content_snapshot, origin, priority, enqueued_at, read_count
        "#,
    )
    .bind(deadline)
    .bind(now)
    .bind(batch_size as i64)
    .fetch_all(pool)
    .await?;

    let mut jobs: Vec<Job> = rows
        .iter()
        .map(|row| {
            let origin: String = row.get("origin");
            let priority: String = row.get("priority");
            Job {
                message_id: row.get("message_id"),
                document_id: row.get("document_id"),
                content_snapshot: row.get("content_snapshot"),
                origin: JobOrigin::parse(&origin),
                priority: JobPriority::parse(&priority),
                enqueued_at: row.get("enqueued_at"),
                read_count: row.get("read_count"),
            }
        })
        .collect();

    // RETURNING does not promise row order; deliver oldest first.
    jobs.sort_by_key(|j| j.message_id);

    Ok(jobs)
}

/// Permanently remove a job. Returns false if the id was not found (already
/// archived; callers treat that as success-equivalent).
pub async fn archive(pool: &SqlitePool, message_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM jobs WHERE message_id = ?")
        .bind(message_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Current job count, visible and invisible. Used for load-shedding and
/// adaptive batch sizing.
pub async fn size(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Document ids with a job currently in the queue (any visibility state).
/// The enqueuer's de-duplication set.
pub async fn pending_ids(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query_scalar::<_, String>("SELECT DISTINCT document_id FROM jobs")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().collect())
}

/// True when a job for this document is already queued. Fast-path duplicate
/// suppression; racy against concurrent producers, which is acceptable
/// because redundant jobs converge to the same sidecar row.
pub async fn has_pending(pool: &SqlitePool, document_id: &str) -> Result<bool> {
    let exists: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE document_id = ?)")
            .bind(document_id)
            .fetch_one(pool)
            .await?;

    Ok(exists != 0)
}
