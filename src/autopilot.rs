//! Periodic scheduler: scan, then drain, under a load-shedding guard.
//!
//! Each tick reads the queue depth; at or above the load threshold the stale
//! scan is skipped so scanning can never make a backlog worse. The drain
//! phase always runs: backlog from trigger fast-path enqueues must keep
//! draining whether or not a scan happened. Every failure inside a tick is
//! caught, logged, and swallowed: a tick must never take the scheduler down,
//! and the next tick always fires. The load check is best-effort under
//! concurrent producers; the drain loop's per-cycle batch cap is the real
//! backpressure mechanism.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::drain::{self, DrainOptions, DrainReport};
use crate::enqueue;
use crate::errlog;
use crate::queue;

/// What one tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub queue_size: i64,
    pub scan_skipped: bool,
    pub enqueued: u64,
    pub drain: Option<DrainReport>,
}

/// Run one scheduler tick. Infallible by design: errors are recorded and the
/// tick carries on with its remaining phases.
pub async fn tick(pool: &SqlitePool, config: &Config) -> TickReport {
    let mut report = TickReport {
        queue_size: 0,
        scan_skipped: false,
        enqueued: 0,
        drain: None,
    };

    // Queue unavailable: log and end the tick early. Queue operations are
    // individually atomic, so nothing is left half-done.
    let queue_size = match queue::size(pool).await {
        Ok(n) => n,
        Err(e) => {
            warn!("tick aborted, queue unavailable: {}", e);
            errlog::record_error(
                pool,
                None,
                &format!("Queue unavailable: {}", e),
                serde_json::json!({}),
                "autopilot::tick",
                None,
            )
            .await;
            return report;
        }
    };
    report.queue_size = queue_size;

    if queue_size >= config.autopilot.load_threshold {
        // Load shedding: scanning would only deepen the backlog.
        info!(
            queue_size,
            threshold = config.autopilot.load_threshold,
            "load threshold reached, skipping stale scan"
        );
        report.scan_skipped = true;
    } else {
        match enqueue::enqueue_stale(pool, config, config.autopilot.scan_batch_size).await {
            Ok(n) => report.enqueued = n,
            Err(e) => {
                warn!("stale scan failed: {}", e);
                errlog::record_error(
                    pool,
                    None,
                    &format!("Stale scan failed: {}", e),
                    serde_json::json!({ "scan_batch_size": config.autopilot.scan_batch_size }),
                    "autopilot::tick",
                    None,
                )
                .await;
            }
        }
    }

    // Drain runs regardless of the scan branch.
    match drain::run_drain(pool, config, DrainOptions::default()).await {
        Ok(r) => report.drain = Some(r),
        Err(e) => {
            warn!("drain failed: {}", e);
            errlog::record_error(
                pool,
                None,
                &format!("Drain failed: {}", e),
                serde_json::json!({}),
                "autopilot::tick",
                None,
            )
            .await;
        }
    }

    report
}

/// Run the scheduler until the process is terminated.
pub async fn run_autopilot(pool: &SqlitePool, config: &Config) -> Result<()> {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.autopilot.interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        interval_secs = config.autopilot.interval_secs,
        load_threshold = config.autopilot.load_threshold,
        scan_batch_size = config.autopilot.scan_batch_size,
        "autopilot started"
    );

    loop {
        interval.tick().await;
        let report = tick(pool, config).await;

        let (processed, errors) = report
            .drain
            .as_ref()
            .map(|d| (d.processed, d.errors))
            .unwrap_or((0, 0));
        info!(
            queue_size = report.queue_size,
            scan_skipped = report.scan_skipped,
            enqueued = report.enqueued,
            processed,
            errors,
            "tick complete"
        );
    }
}
