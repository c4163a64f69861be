//! Append-only error log.
//!
//! Every component records failures here with enough context to debug them
//! later. Rows are never mutated and never read by the processing pipeline;
//! the monitoring surface only counts them by age.

use sqlx::SqlitePool;
use tracing::warn;

/// Record a failure. Best-effort: if the log write itself fails, the failure
/// is traced and dropped. Error logging must never take down the caller.
pub async fn record_error(
    pool: &SqlitePool,
    document_id: Option<&str>,
    message: &str,
    context: serde_json::Value,
    function_name: &str,
    queue_message_id: Option<i64>,
) {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO processing_errors
            (document_id, message, context_json, function_name, queue_message_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(document_id)
    .bind(message)
    .bind(context.to_string())
    .bind(function_name)
    .bind(queue_message_id)
    .bind(now)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(
            function = function_name,
            original_error = message,
            "failed to write error record: {}",
            e
        );
    }
}

/// Number of error records younger than `seconds`.
pub async fn errors_since(pool: &SqlitePool, seconds: i64) -> anyhow::Result<i64> {
    let cutoff = chrono::Utc::now().timestamp() - seconds;

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM processing_errors WHERE created_at >= ?")
            .bind(cutoff)
            .fetch_one(pool)
            .await?;

    Ok(count)
}
