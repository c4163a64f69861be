use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Source documents. The content fingerprint is maintained at write time so
    // stale scans never recompute hashes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sidecar embeddings, 1:1 with documents. Hash and vector live in the same
    // row so the pair is always written atomically.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            document_id TEXT PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
            content_hash TEXT NOT NULL,
            dims INTEGER NOT NULL,
            vector BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Durable job queue with visibility-timeout redelivery. message_id is
    // monotonically increasing; visible_at <= now means claimable.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            message_id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            content_snapshot TEXT NOT NULL,
            origin TEXT NOT NULL DEFAULT 'scan',
            priority TEXT NOT NULL DEFAULT 'normal',
            enqueued_at INTEGER NOT NULL,
            visible_at INTEGER NOT NULL,
            read_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only diagnostic log; never read by the processing pipeline.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_errors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT,
            message TEXT NOT NULL,
            context_json TEXT NOT NULL DEFAULT '{}',
            function_name TEXT NOT NULL,
            queue_message_id INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_visible_at ON jobs(visible_at, message_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_document_id ON jobs(document_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_errors_created_at ON processing_errors(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
