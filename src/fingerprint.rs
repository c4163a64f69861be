//! Content fingerprinting for change detection.
//!
//! A fingerprint is a hex-encoded SHA-256 digest of the document content.
//! Deterministic and stable across restarts, so a stored fingerprint can be
//! compared against freshly written content at any later time.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

/// Compute the fingerprint of a content string.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// True iff the document has no sidecar embedding, or the sidecar was derived
/// from different content than what is currently stored. Unknown documents
/// also report true (there is nothing derived for them).
pub async fn needs_update(pool: &SqlitePool, document_id: &str) -> Result<bool> {
    let row = sqlx::query(
        r#"
        SELECT d.content_hash AS current_hash, e.content_hash AS stored_hash
        FROM documents d
        LEFT JOIN embeddings e ON e.document_id = d.id
        WHERE d.id = ?
        "#,
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(true);
    };

    let current: String = row.get("current_hash");
    let stored: Option<String> = row.get("stored_hash");

    Ok(stored.as_deref() != Some(current.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(fingerprint("hello"), fingerprint("hello"));
        assert_ne!(fingerprint("hello"), fingerprint("world"));
    }

    #[test]
    fn test_fingerprint_known_digest() {
        // SHA-256 of the empty string is a fixed constant
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let digest = fingerprint("some content");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
