//! The adaptive drain loop.
//!
//! Repeatedly claims batches from the queue, embeds each job's content
//! snapshot, upserts the sidecar row, and archives the job. Batch size is
//! recomputed from the current queue depth every cycle; the loop stops on an
//! empty read (no work means stop, never a cycle counter) or when its
//! wall-clock budget runs out. The budget is checked inside the per-job loop,
//! so one long batch cannot overshoot the deadline by more than a single
//! job's processing time.
//!
//! Failure handling per job:
//! - embed/store failure: error record written, job left in the queue for
//!   visibility-timeout redelivery; once `read_count` reaches the configured
//!   cap the job is archived as a dead letter instead (poison containment).
//! - malformed payload (empty document id): archived immediately, since
//!   retrying cannot fix malformed data.
//!
//! One job's failure never aborts the batch or the cycle.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::errlog;
use crate::fingerprint::fingerprint;
use crate::models::Job;
use crate::queue;
use crate::sidecar;

/// Overrides for one drain invocation. `None` fields fall back to the
/// adaptive batch size and the configured time budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainOptions {
    pub batch_size: Option<usize>,
    pub time_budget: Option<Duration>,
}

/// Outcome summary of one drain invocation.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub processed: u64,
    pub errors: u64,
    pub cycles: u64,
    pub processing_time_ms: u64,
    pub throughput_per_second: f64,
}

/// Batch size as a monotonic step function of queue depth: small backlogs
/// drain one job at a time, larger backlogs get mildly larger batches, capped
/// low enough that a single batch always fits the processing-time budget.
pub fn adaptive_batch_size(queue_depth: i64, cap: usize) -> usize {
    let base = if queue_depth <= 10 {
        1
    } else if queue_depth <= 50 {
        2
    } else if queue_depth <= 200 {
        3
    } else {
        cap
    };
    base.min(cap).max(1)
}

/// Run the drain loop until the queue is empty or the time budget is spent.
pub async fn run_drain(
    pool: &SqlitePool,
    config: &Config,
    opts: DrainOptions,
) -> Result<DrainReport> {
    let provider = embedding::create_provider(&config.embedding)?;

    let budget = opts
        .time_budget
        .unwrap_or(Duration::from_secs(config.drain.time_budget_secs));
    let pause = Duration::from_millis(config.drain.full_batch_pause_ms);
    let start = Instant::now();

    let mut processed = 0u64;
    let mut errors = 0u64;
    let mut cycles = 0u64;

    'cycles: while start.elapsed() < budget {
        let depth = queue::size(pool).await?;
        let batch_size = opts
            .batch_size
            .unwrap_or_else(|| adaptive_batch_size(depth, config.drain.max_batch_size));

        let jobs = queue::read(pool, config.queue.visibility_timeout_secs, batch_size).await?;
        if jobs.is_empty() {
            // No visible work: the loop terminates itself.
            break;
        }

        cycles += 1;
        let full_batch = jobs.len() == batch_size;
        debug!(cycle = cycles, depth, batch = jobs.len(), "claimed batch");

        for job in &jobs {
            if start.elapsed() >= budget {
                warn!(processed, "time budget exhausted mid-batch");
                break 'cycles;
            }

            match handle_job(pool, config, provider.as_ref(), job).await? {
                JobOutcome::Processed => processed += 1,
                JobOutcome::Failed => errors += 1,
            }
        }

        // A full batch suggests more work is pending; yield briefly instead
        // of hot-looping against the queue.
        if full_batch && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    let elapsed = start.elapsed();
    let processing_time_ms = elapsed.as_millis() as u64;
    let throughput_per_second = if elapsed.as_secs_f64() > 0.0 {
        processed as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    info!(
        processed,
        errors, cycles, processing_time_ms, "drain finished"
    );

    Ok(DrainReport {
        processed,
        errors,
        cycles,
        processing_time_ms,
        throughput_per_second,
    })
}

enum JobOutcome {
    Processed,
    Failed,
}

/// Process one claimed job. Only queue-store unavailability propagates as
/// `Err`; embedding and sidecar failures are contained to the job.
async fn handle_job(
    pool: &SqlitePool,
    config: &Config,
    provider: &dyn EmbeddingProvider,
    job: &Job,
) -> Result<JobOutcome> {
    if job.document_id.is_empty() {
        // Malformed payload: a retry cannot repair it, archive immediately.
        errlog::record_error(
            pool,
            None,
            "Malformed job payload: empty document id",
            serde_json::json!({ "read_count": job.read_count }),
            "drain::handle_job",
            Some(job.message_id),
        )
        .await;
        queue::archive(pool, job.message_id).await?;
        return Ok(JobOutcome::Failed);
    }

    match embed_and_store(pool, config, provider, job).await {
        Ok(()) => {
            // Archive only after this job's embed + store succeeded.
            queue::archive(pool, job.message_id).await?;
            Ok(JobOutcome::Processed)
        }
        Err(e) => {
            let dead_letter = job.read_count >= config.queue.max_read_count;
            warn!(
                document_id = %job.document_id,
                message_id = job.message_id,
                read_count = job.read_count,
                dead_letter,
                "job failed: {}",
                e
            );
            errlog::record_error(
                pool,
                Some(&job.document_id),
                &e.to_string(),
                serde_json::json!({
                    "content_length": job.content_snapshot.len(),
                    "origin": job.origin.as_str(),
                    "read_count": job.read_count,
                    "dead_letter": dead_letter,
                }),
                "drain::handle_job",
                Some(job.message_id),
            )
            .await;

            if dead_letter {
                // Poison containment: enough deliveries, stop redelivering.
                queue::archive(pool, job.message_id).await?;
            }
            Ok(JobOutcome::Failed)
        }
    }
}

async fn embed_and_store(
    pool: &SqlitePool,
    config: &Config,
    provider: &dyn EmbeddingProvider,
    job: &Job,
) -> Result<()> {
    let vector = embedding::embed_one(provider, &config.embedding, &job.content_snapshot).await?;

    let expected = provider.dims();
    if expected > 0 && vector.len() != expected {
        bail!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected,
            vector.len()
        );
    }

    // Fingerprint of the snapshot that was actually embedded. If the document
    // changed since this job was enqueued, the next scan catches the mismatch
    // and re-enqueues.
    let hash = fingerprint(&job.content_snapshot);
    sidecar::upsert_embedding(pool, &job.document_id, &hash, &vector).await?;

    Ok(())
}
