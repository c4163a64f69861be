//! Queue contract tests: durable send, atomic claim with visibility timeout,
//! redelivery, and archive semantics.

use sqlx::SqlitePool;
use tempfile::TempDir;

use embedsync::config::{Config, DbConfig};
use embedsync::models::{JobOrigin, JobPriority};
use embedsync::{db, migrate, queue};

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("esy.sqlite"),
        },
        embedding: Default::default(),
        queue: Default::default(),
        enqueue: Default::default(),
        drain: Default::default(),
        autopilot: Default::default(),
        server: Default::default(),
    }
}

async fn setup() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}

#[tokio::test]
async fn test_send_assigns_increasing_message_ids() {
    let (_tmp, pool) = setup().await;

    let a = queue::send(&pool, "doc-a", "alpha", JobOrigin::Trigger, JobPriority::Normal)
        .await
        .unwrap();
    let b = queue::send(&pool, "doc-b", "beta", JobOrigin::Scan, JobPriority::High)
        .await
        .unwrap();

    assert!(b > a, "message ids must be monotonically increasing");
    assert_eq!(queue::size(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_read_delivers_oldest_first() {
    let (_tmp, pool) = setup().await;

    queue::send(&pool, "doc-a", "alpha", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();
    queue::send(&pool, "doc-b", "beta", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    let first = queue::read(&pool, 300, 1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].document_id, "doc-a");

    let second = queue::read(&pool, 300, 1).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].document_id, "doc-b");
}

#[tokio::test]
async fn test_claimed_jobs_are_invisible() {
    let (_tmp, pool) = setup().await;

    queue::send(&pool, "doc-a", "alpha", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    let claimed = queue::read(&pool, 300, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].read_count, 1);

    // Still counted, but not claimable again before the deadline
    assert_eq!(queue::size(&pool).await.unwrap(), 1);
    let again = queue::read(&pool, 300, 10).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_visibility_expiry_redelivers() {
    let (_tmp, pool) = setup().await;

    queue::send(&pool, "doc-a", "alpha", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    // Zero timeout: the job is eligible again immediately
    let first = queue::read(&pool, 0, 10).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].read_count, 1);

    let redelivered = queue::read(&pool, 0, 10).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].message_id, first[0].message_id);
    assert_eq!(redelivered[0].read_count, 2);
}

#[tokio::test]
async fn test_archive_removes_job() {
    let (_tmp, pool) = setup().await;

    let id = queue::send(&pool, "doc-a", "alpha", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();

    assert!(queue::archive(&pool, id).await.unwrap());
    assert_eq!(queue::size(&pool).await.unwrap(), 0);

    // Unknown id: false, not an error
    assert!(!queue::archive(&pool, id).await.unwrap());
    assert!(!queue::archive(&pool, 9999).await.unwrap());
}

#[tokio::test]
async fn test_read_empty_queue_is_not_an_error() {
    let (_tmp, pool) = setup().await;

    let jobs = queue::read(&pool, 300, 5).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn test_pending_ids_covers_invisible_jobs() {
    let (_tmp, pool) = setup().await;

    queue::send(&pool, "doc-a", "alpha", JobOrigin::Scan, JobPriority::Normal)
        .await
        .unwrap();
    queue::send(&pool, "doc-b", "beta", JobOrigin::Trigger, JobPriority::Normal)
        .await
        .unwrap();

    // Claim one; both must still count as pending for de-duplication
    let claimed = queue::read(&pool, 300, 1).await.unwrap();
    assert_eq!(claimed.len(), 1);

    let pending = queue::pending_ids(&pool).await.unwrap();
    assert!(pending.contains("doc-a"));
    assert!(pending.contains("doc-b"));

    assert!(queue::has_pending(&pool, "doc-a").await.unwrap());
    assert!(!queue::has_pending(&pool, "doc-c").await.unwrap());
}

#[tokio::test]
async fn test_job_payload_roundtrip() {
    let (_tmp, pool) = setup().await;

    queue::send(&pool, "doc-a", "the snapshot", JobOrigin::Trigger, JobPriority::High)
        .await
        .unwrap();

    let jobs = queue::read(&pool, 300, 1).await.unwrap();
    let job = &jobs[0];
    assert_eq!(job.document_id, "doc-a");
    assert_eq!(job.content_snapshot, "the snapshot");
    assert_eq!(job.origin, JobOrigin::Trigger);
    assert_eq!(job.priority, JobPriority::High);
    assert!(job.enqueued_at > 0);
}
