//! End-to-end pipeline tests: mutation → enqueue → drain → sidecar, driven
//! through the library with the deterministic `hashed` embedding provider.

use sqlx::SqlitePool;
use tempfile::TempDir;

use embedsync::config::{Config, DbConfig, EmbeddingConfig, QueueConfig};
use embedsync::drain::DrainOptions;
use embedsync::fingerprint::fingerprint;
use embedsync::models::{JobOrigin, JobPriority};
use embedsync::{
    autopilot, db, detector, documents, drain, enqueue, errlog, fingerprint as fp, migrate, queue,
    sidecar, status,
};

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("esy.sqlite"),
        },
        embedding: EmbeddingConfig {
            provider: "hashed".to_string(),
            ..Default::default()
        },
        queue: Default::default(),
        enqueue: Default::default(),
        drain: Default::default(),
        autopilot: Default::default(),
        server: Default::default(),
    }
}

async fn setup() -> (TempDir, Config, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, config, pool)
}

/// Insert a document row directly, bypassing the mutation hook. Used to
/// stage stale documents with controlled timestamps for scan-path tests.
async fn insert_document_raw(pool: &SqlitePool, id: &str, content: &str, updated_at: i64) {
    sqlx::query(
        "INSERT INTO documents (id, content, metadata_json, content_hash, created_at, updated_at)
         VALUES (?, ?, '{}', ?, ?, ?)",
    )
    .bind(id)
    .bind(content)
    .bind(fingerprint(content))
    .bind(updated_at)
    .bind(updated_at)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_insert_enqueues_and_drains_to_fresh_embedding() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();

    // Exactly one job, carrying the content snapshot
    assert_eq!(queue::size(&pool).await.unwrap(), 1);
    let jobs = queue::read(&pool, 0, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].document_id, "doc-a");
    assert_eq!(jobs[0].content_snapshot, "hello");
    assert_eq!(jobs[0].origin, JobOrigin::Trigger);

    let report = drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.errors, 0);

    let emb = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(emb.content_hash, fingerprint("hello"));
    assert_eq!(emb.dims, 384);
    assert_eq!(emb.vector.len(), 384);

    // Job archived, queue back to empty
    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    assert!(!fp::needs_update(&pool, "doc-a").await.unwrap());
}

#[tokio::test]
async fn test_update_converges_to_new_fingerprint() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    documents::put_document(&pool, &config, "doc-a", "world", None)
        .await
        .unwrap();
    assert!(fp::needs_update(&pool, "doc-a").await.unwrap());

    // A concurrent scan observing the same change must not duplicate the job
    let extra = enqueue::enqueue_stale(&pool, &config, 100).await.unwrap();
    assert_eq!(extra, 0);
    assert_eq!(queue::size(&pool).await.unwrap(), 1);

    drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    let emb = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(emb.content_hash, fingerprint("world"));
    assert!(!fp::needs_update(&pool, "doc-a").await.unwrap());
}

#[tokio::test]
async fn test_stale_snapshot_converges_via_next_scan() {
    let (_tmp, config, pool) = setup().await;

    // Three rapid mutations: the fast path enqueues once (v1 snapshot), the
    // later writes are suppressed while that job is in flight.
    documents::put_document(&pool, &config, "doc-a", "v1", None)
        .await
        .unwrap();
    documents::put_document(&pool, &config, "doc-a", "v2", None)
        .await
        .unwrap();
    documents::put_document(&pool, &config, "doc-a", "v3", None)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 1);

    // Tick 1 drains the stale v1 snapshot; the sidecar is momentarily behind
    let first = autopilot::tick(&pool, &config).await;
    assert_eq!(first.drain.as_ref().unwrap().processed, 1);
    let emb = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(emb.content_hash, fingerprint("v1"));
    assert!(fp::needs_update(&pool, "doc-a").await.unwrap());

    // Tick 2's scan catches the mismatch and converges
    let second = autopilot::tick(&pool, &config).await;
    assert_eq!(second.enqueued, 1);
    assert_eq!(second.drain.as_ref().unwrap().processed, 1);

    let emb = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(emb.content_hash, fingerprint("v3"));
    assert!(!fp::needs_update(&pool, "doc-a").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_suppression_against_pending_job() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 1);

    // Scan path must not add a second job for the same document
    let enqueued = enqueue::enqueue_stale(&pool, &config, 100).await.unwrap();
    assert_eq!(enqueued, 0);
    assert_eq!(queue::size(&pool).await.unwrap(), 1);

    // Neither must a repeated identical write
    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_upsert_idempotence_under_redelivery() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();

    // Simulate a duplicate job slipping past de-duplication
    queue::send(&pool, "doc-a", "hello", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 2);

    let report = drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 0);

    // One sidecar row, correct fingerprint, queue drained
    let emb = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(emb.content_hash, fingerprint("hello"));
    assert_eq!(sidecar::count_embeddings(&pool).await.unwrap(), 1);
    assert_eq!(queue::size(&pool).await.unwrap(), 0);

    // Direct double-upsert with identical inputs leaves identical state
    sidecar::upsert_embedding(&pool, "doc-a", &emb.content_hash, &emb.vector)
        .await
        .unwrap();
    let again = sidecar::get_embedding(&pool, "doc-a").await.unwrap().unwrap();
    assert_eq!(again.content_hash, emb.content_hash);
    assert_eq!(again.vector, emb.vector);
}

#[tokio::test]
async fn test_failing_job_does_not_block_batch() {
    let (_tmp, config, pool) = setup().await;

    for i in 1..=4 {
        documents::put_document(&pool, &config, &format!("doc-{}", i), &format!("content {}", i), None)
            .await
            .unwrap();
    }
    // Empty snapshot: the embedder rejects it on every attempt
    queue::send(&pool, "doc-bad", "", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 5);

    let report = drain::run_drain(
        &pool,
        &config,
        DrainOptions {
            batch_size: Some(5),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Four successes archived, one failure recorded and left for redelivery
    assert_eq!(report.processed, 4);
    assert_eq!(report.errors, 1);
    assert_eq!(queue::size(&pool).await.unwrap(), 1);
    assert_eq!(errlog::errors_since(&pool, 3600).await.unwrap(), 1);

    for i in 1..=4 {
        let emb = sidecar::get_embedding(&pool, &format!("doc-{}", i))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(emb.content_hash, fingerprint(&format!("content {}", i)));
    }
    assert!(sidecar::get_embedding(&pool, "doc-bad").await.unwrap().is_none());
}

#[tokio::test]
async fn test_poison_job_archived_after_read_count_cap() {
    let (_tmp, mut config, pool) = setup().await;
    config.queue = QueueConfig {
        visibility_timeout_secs: 0,
        max_read_count: 2,
    };

    queue::send(&pool, "doc-bad", "", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    // Zero visibility timeout: the failing job is redelivered within one
    // drain invocation until the read-count cap dead-letters it.
    let report = drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.errors, 2);
    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    assert_eq!(errlog::errors_since(&pool, 3600).await.unwrap(), 2);
}

#[tokio::test]
async fn test_malformed_job_archived_immediately() {
    let (_tmp, config, pool) = setup().await;

    queue::send(&pool, "", "orphan content", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    let report = drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.errors, 1);
    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    assert_eq!(errlog::errors_since(&pool, 3600).await.unwrap(), 1);
}

#[tokio::test]
async fn test_drain_auto_stops_on_empty_queue() {
    let (_tmp, config, pool) = setup().await;

    let report = drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.cycles, 0);
}

#[tokio::test]
async fn test_load_shedding_skips_scan_but_still_drains() {
    let (_tmp, mut config, pool) = setup().await;
    config.autopilot.load_threshold = 1;

    // One pending job puts the queue at the threshold
    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    // A stale document with no job in flight, which a scan would pick up
    insert_document_raw(&pool, "doc-b", "beta content", 100).await;
    assert_eq!(queue::size(&pool).await.unwrap(), 1);

    let report = autopilot::tick(&pool, &config).await;

    assert!(report.scan_skipped);
    assert_eq!(report.enqueued, 0);
    // Drain ran regardless and cleared the existing backlog
    assert_eq!(report.drain.as_ref().unwrap().processed, 1);
    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    // The stale document is still waiting for a later, unshed tick
    assert_eq!(detector::count_stale(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_scan_orders_most_recently_updated_first() {
    let (_tmp, mut config, pool) = setup().await;
    config.autopilot.scan_batch_size = 2;

    insert_document_raw(&pool, "doc-old", "old", 100).await;
    insert_document_raw(&pool, "doc-mid", "mid", 200).await;
    insert_document_raw(&pool, "doc-new", "new", 300).await;
    insert_document_raw(&pool, "doc-newest", "newest", 400).await;

    let stale = detector::find_stale(&pool, 10).await.unwrap();
    assert_eq!(stale.len(), 4);
    assert_eq!(stale[0].id, "doc-newest");
    assert_eq!(stale[1].id, "doc-new");

    // Bounded scan takes exactly the most recent slice
    let enqueued = enqueue::enqueue_stale(&pool, &config, config.autopilot.scan_batch_size)
        .await
        .unwrap();
    assert_eq!(enqueued, 2);

    let jobs = queue::read(&pool, 300, 10).await.unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.document_id.as_str()).collect();
    assert!(ids.contains(&"doc-newest"));
    assert!(ids.contains(&"doc-new"));
    assert!(!ids.contains(&"doc-old"));
}

#[tokio::test]
async fn test_empty_content_is_never_eligible() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-empty", "", None)
        .await
        .unwrap();

    // No fast-path job, and no scan-path job either
    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    let enqueued = enqueue::enqueue_stale(&pool, &config, 100).await.unwrap();
    assert_eq!(enqueued, 0);
    assert!(detector::find_stale(&pool, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metadata_only_write_does_not_enqueue() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    documents::put_document(&pool, &config, "doc-a", "hello", Some(r#"{"tag":"x"}"#))
        .await
        .unwrap();

    assert_eq!(queue::size(&pool).await.unwrap(), 0);
    assert!(!fp::needs_update(&pool, "doc-a").await.unwrap());
}

#[tokio::test]
async fn test_delete_cascades_to_sidecar() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();
    assert!(sidecar::get_embedding(&pool, "doc-a").await.unwrap().is_some());

    assert!(documents::delete_document(&pool, "doc-a").await.unwrap());
    assert!(sidecar::get_embedding(&pool, "doc-a").await.unwrap().is_none());
    assert!(!documents::delete_document(&pool, "doc-a").await.unwrap());
}

#[tokio::test]
async fn test_status_reports_coverage_and_backlog() {
    let (_tmp, config, pool) = setup().await;

    documents::put_document(&pool, &config, "doc-a", "hello", None)
        .await
        .unwrap();
    documents::put_document(&pool, &config, "doc-b", "world", None)
        .await
        .unwrap();
    assert_eq!(queue::size(&pool).await.unwrap(), 2);

    let before = status::collect_status(&pool).await.unwrap();
    assert_eq!(before.total_documents, 2);
    assert_eq!(before.pending_jobs, 2);
    assert_eq!(before.embeddings_count, 0);
    assert_eq!(before.stale_count, 2);
    assert_eq!(before.coverage_percent, 0.0);

    drain::run_drain(&pool, &config, DrainOptions::default())
        .await
        .unwrap();

    let after = status::collect_status(&pool).await.unwrap();
    assert_eq!(after.pending_jobs, 0);
    assert_eq!(after.embeddings_count, 2);
    assert_eq!(after.valid_embeddings_count, 2);
    assert_eq!(after.stale_count, 0);
    assert_eq!(after.coverage_percent, 100.0);
}
