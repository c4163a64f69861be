use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub enqueue: EnqueueConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub autopilot: AutopilotConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Durable job queue settings.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// How long a claimed job stays invisible before automatic redelivery.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: i64,
    /// Deliveries after which a still-failing job is archived as a dead letter.
    #[serde(default = "default_max_read_count")]
    pub max_read_count: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_read_count: default_max_read_count(),
        }
    }
}

fn default_visibility_timeout_secs() -> i64 {
    300
}
fn default_max_read_count() -> i64 {
    5
}

/// Scan-path enqueue settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EnqueueConfig {
    /// Jobs per transaction when pushing a scan batch.
    #[serde(default = "default_commit_batch_size")]
    pub commit_batch_size: usize,
    /// Content length above which a job carries the `high` priority hint.
    #[serde(default = "default_high_priority_length")]
    pub high_priority_length: i64,
    /// Default stale-scan limit for the CLI `scan` command.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: i64,
}

impl Default for EnqueueConfig {
    fn default() -> Self {
        Self {
            commit_batch_size: default_commit_batch_size(),
            high_priority_length: default_high_priority_length(),
            scan_limit: default_scan_limit(),
        }
    }
}

fn default_commit_batch_size() -> usize {
    100
}
fn default_high_priority_length() -> i64 {
    10_000
}
fn default_scan_limit() -> i64 {
    50_000
}

/// Drain loop settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DrainConfig {
    /// Wall-clock budget for one drain invocation, in seconds.
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
    /// Upper bound for the adaptive batch size.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Pause after a full batch, to avoid hot-looping against the queue.
    #[serde(default = "default_full_batch_pause_ms")]
    pub full_batch_pause_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget_secs(),
            max_batch_size: default_max_batch_size(),
            full_batch_pause_ms: default_full_batch_pause_ms(),
        }
    }
}

fn default_time_budget_secs() -> u64 {
    25
}
fn default_max_batch_size() -> usize {
    5
}
fn default_full_batch_pause_ms() -> u64 {
    100
}

/// Autopilot scheduler settings.
#[derive(Debug, Deserialize, Clone)]
pub struct AutopilotConfig {
    /// Seconds between ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Queue depth at or above which a tick skips the stale scan.
    #[serde(default = "default_load_threshold")]
    pub load_threshold: i64,
    /// Stale-scan limit per tick.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: i64,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            load_threshold: default_load_threshold(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}
fn default_load_threshold() -> i64 {
    1000
}
fn default_scan_batch_size() -> i64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate queue
    if config.queue.visibility_timeout_secs < 0 {
        anyhow::bail!("queue.visibility_timeout_secs must be >= 0");
    }
    if config.queue.max_read_count < 1 {
        anyhow::bail!("queue.max_read_count must be >= 1");
    }

    // Validate enqueue
    if config.enqueue.commit_batch_size == 0 {
        anyhow::bail!("enqueue.commit_batch_size must be > 0");
    }

    // Validate drain
    if config.drain.max_batch_size == 0 {
        anyhow::bail!("drain.max_batch_size must be > 0");
    }
    if config.drain.time_budget_secs == 0 {
        anyhow::bail!("drain.time_budget_secs must be > 0");
    }

    // Validate autopilot
    if config.autopilot.interval_secs == 0 {
        anyhow::bail!("autopilot.interval_secs must be > 0");
    }
    if config.autopilot.scan_batch_size < 1 {
        anyhow::bail!("autopilot.scan_batch_size must be >= 1");
    }

    // Validate embedding. The hashed provider needs no model and defaults its dims.
    if config.embedding.is_enabled() && config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.is_enabled() && config.embedding.provider != "hashed" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" | "hashed" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hashed.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "/tmp/esy.sqlite"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.visibility_timeout_secs, 300);
        assert_eq!(config.queue.max_read_count, 5);
        assert_eq!(config.enqueue.commit_batch_size, 100);
        assert_eq!(config.drain.max_batch_size, 5);
        assert_eq!(config.autopilot.interval_secs, 30);
        assert_eq!(config.autopilot.load_threshold, 1000);
        assert_eq!(config.autopilot.scan_batch_size, 500);
        assert_eq!(config.embedding.provider, "disabled");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_section_overrides() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "/tmp/esy.sqlite"

            [queue]
            visibility_timeout_secs = 60

            [autopilot]
            load_threshold = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.visibility_timeout_secs, 60);
        assert_eq!(config.autopilot.load_threshold, 50);
        // Untouched fields keep their defaults
        assert_eq!(config.queue.max_read_count, 5);
        assert_eq!(config.autopilot.scan_batch_size, 500);
    }
}
