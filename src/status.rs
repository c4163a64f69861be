//! Synchronization health overview.
//!
//! Provides a quick summary of pipeline state: document and embedding counts,
//! queue depth, stale backlog, recent errors, and coverage. Used by
//! `esy status` and `GET /status` to give confidence that the pipeline is
//! converging. Purely observational; the pipeline never reads this.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::detector;
use crate::documents;
use crate::errlog;
use crate::queue;
use crate::sidecar;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub pending_jobs: i64,
    pub total_documents: i64,
    pub embeddings_count: i64,
    pub valid_embeddings_count: i64,
    pub stale_count: i64,
    pub errors_last_hour: i64,
    pub errors_last_24h: i64,
    pub coverage_percent: f64,
}

pub async fn collect_status(pool: &SqlitePool) -> Result<StatusReport> {
    let pending_jobs = queue::size(pool).await?;
    let total_documents = documents::count_documents(pool).await?;
    let embeddings_count = sidecar::count_embeddings(pool).await?;

    // Valid = derived from the content currently stored
    let valid_embeddings_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM embeddings e
        JOIN documents d ON d.id = e.document_id
        WHERE e.content_hash = d.content_hash
        "#,
    )
    .fetch_one(pool)
    .await?;

    let stale_count = detector::count_stale(pool).await?;

    let errors_last_hour = errlog::errors_since(pool, 3600).await?;
    let errors_last_24h = errlog::errors_since(pool, 86_400).await?;

    let coverage_percent = if total_documents > 0 {
        (valid_embeddings_count as f64 / total_documents as f64) * 100.0
    } else {
        100.0
    };

    Ok(StatusReport {
        pending_jobs,
        total_documents,
        embeddings_count,
        valid_embeddings_count,
        stale_count,
        errors_last_hour,
        errors_last_24h,
        coverage_percent,
    })
}

/// Print the report in the CLI's summary style.
pub fn print_status(report: &StatusReport) {
    println!("Embedsync — Pipeline Status");
    println!("===========================");
    println!();
    println!("  Documents:        {}", report.total_documents);
    println!(
        "  Embeddings:       {} ({} valid)",
        report.embeddings_count, report.valid_embeddings_count
    );
    println!("  Stale:            {}", report.stale_count);
    println!("  Pending jobs:     {}", report.pending_jobs);
    println!("  Coverage:         {:.1}%", report.coverage_percent);
    println!();
    println!(
        "  Errors:           {} last hour, {} last 24h",
        report.errors_last_hour, report.errors_last_24h
    );
    println!();
}
