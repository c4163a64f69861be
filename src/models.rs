//! Core data models used throughout Embedsync.
//!
//! These types represent the documents, queue jobs, and stale-scan results
//! that flow through the synchronization pipeline.

/// Source record stored in SQLite. `content` is the sole derivation input;
/// `content_hash` is recomputed on every content write.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata_json: String,
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A document whose sidecar embedding is missing or out of date.
#[derive(Debug, Clone)]
pub struct StaleDocument {
    pub id: String,
    pub content: String,
    pub current_hash: String,
    pub stored_hash: Option<String>,
    pub content_length: i64,
}

/// Which path pushed a job into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// Fast path: fired by a document mutation.
    Trigger,
    /// Periodic stale scan.
    Scan,
}

impl JobOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOrigin::Trigger => "trigger",
            JobOrigin::Scan => "scan",
        }
    }

    pub fn parse(s: &str) -> JobOrigin {
        match s {
            "trigger" => JobOrigin::Trigger,
            _ => JobOrigin::Scan,
        }
    }
}

/// Priority hint carried in the job payload. Informational only; delivery
/// order stays oldest-visible-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPriority {
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> JobPriority {
        match s {
            "high" => JobPriority::High,
            _ => JobPriority::Normal,
        }
    }
}

/// A queue job as delivered by a claim. `read_count` includes this delivery.
#[derive(Debug, Clone)]
pub struct Job {
    pub message_id: i64,
    pub document_id: String,
    pub content_snapshot: String,
    pub origin: JobOrigin,
    pub priority: JobPriority,
    pub enqueued_at: i64,
    pub read_count: i64,
}

/// Sidecar row: the embedding plus the fingerprint of the content it was
/// derived from.
#[derive(Debug, Clone)]
pub struct SidecarEmbedding {
    pub document_id: String,
    pub content_hash: String,
    pub dims: i64,
    pub vector: Vec<f32>,
    pub updated_at: i64,
}
