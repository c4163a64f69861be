//! Converts stale documents into queue jobs.
//!
//! Two producers feed the queue: the scan path ([`enqueue_stale`], driven by
//! the autopilot) and the trigger fast path ([`enqueue_for_document`], fired
//! by a committed content mutation). Both suppress duplicates against jobs
//! already in flight; the race between them is tolerated because sidecar
//! upserts are idempotent per fingerprint, so a redundant job is wasteful
//! but not wrong.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::Config;
use crate::detector;
use crate::models::{JobOrigin, JobPriority, StaleDocument};
use crate::queue;

/// Scan for stale documents and enqueue a regeneration job for each one that
/// does not already have a job in flight. Returns the number of jobs created.
///
/// Pushes are committed in sub-batches (`enqueue.commit_batch_size`) so a
/// large backlog never holds one giant transaction open. An error aborts the
/// remainder; already-committed sub-batches stand, and the caller logs and
/// carries on (the drain phase runs regardless).
pub async fn enqueue_stale(pool: &SqlitePool, config: &Config, limit: i64) -> Result<u64> {
    let stale = detector::find_stale(pool, limit).await?;

    // Nothing stale: done, without touching the queue at all.
    if stale.is_empty() {
        return Ok(0);
    }

    // De-duplication set: documents that already have a job in flight. This
    // can miss a concurrently fast-pathed job; the redundant push is
    // harmless because sidecar upserts are idempotent per fingerprint.
    let pending = queue::pending_ids(pool).await?;

    let to_push: Vec<&StaleDocument> = stale
        .iter()
        .filter(|doc| !pending.contains(&doc.id))
        .collect();

    if to_push.is_empty() {
        debug!(
            stale = stale.len(),
            "all stale documents already have jobs in flight"
        );
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut enqueued = 0u64;

    for batch in to_push.chunks(config.enqueue.commit_batch_size) {
        let mut tx = pool.begin().await?;

        for doc in batch {
            let priority = priority_for(doc.content_length, config.enqueue.high_priority_length);

            sqlx::query(
                r#"
                INSERT INTO jobs (document_id, content_snapshot, origin, priority, enqueued_at, visible_at, read_count)
                VALUES (?, ?, ?, ?, ?, ?, 0)
                "#,
            )
            .bind(&doc.id)
            .bind(&doc.content)
            .bind(JobOrigin::Scan.as_str())
            .bind(priority.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        enqueued += batch.len() as u64;
    }

    info!(enqueued, stale = stale.len(), "stale scan complete");
    Ok(enqueued)
}

/// Trigger fast path: enqueue one job for a freshly mutated document,
/// snapshotting its content. Returns false when a job for the document is
/// already queued (duplicate suppressed).
pub async fn enqueue_for_document(
    pool: &SqlitePool,
    config: &Config,
    document_id: &str,
    content: &str,
) -> Result<bool> {
    if queue::has_pending(pool, document_id).await? {
        debug!(document_id, "job already pending, fast path suppressed");
        return Ok(false);
    }

    let priority = priority_for(content.len() as i64, config.enqueue.high_priority_length);
    queue::send(pool, document_id, content, JobOrigin::Trigger, priority).await?;

    debug!(document_id, "fast-path job enqueued");
    Ok(true)
}

fn priority_for(content_length: i64, threshold: i64) -> JobPriority {
    if content_length > threshold {
        JobPriority::High
    } else {
        JobPriority::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_threshold() {
        assert_eq!(priority_for(100, 10_000), JobPriority::Normal);
        assert_eq!(priority_for(10_000, 10_000), JobPriority::Normal);
        assert_eq!(priority_for(10_001, 10_000), JobPriority::High);
    }
}
