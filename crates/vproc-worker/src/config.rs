//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumers kept alive at all times
    pub min_consumers: usize,
    /// Upper bound on parallel consumers (surge consumers included)
    pub max_consumers: usize,
    /// How long a consumer blocks waiting for a message
    pub consume_block: Duration,
    /// How often the pool checks the backlog for scaling
    pub scale_interval: Duration,
    /// Consecutive empty reads after which a surge consumer retires
    pub surge_idle_reads: u32,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Directory for transcoded outputs
    pub processed_dir: String,
    /// Directory for thumbnail outputs
    pub thumbnail_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_consumers: 1,
            max_consumers: 5,
            consume_block: Duration::from_secs(1),
            scale_interval: Duration::from_secs(10),
            surge_idle_reads: 5,
            shutdown_timeout: Duration::from_secs(30),
            processed_dir: "processed".to_string(),
            thumbnail_dir: "thumbnails".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let min_consumers = std::env::var("WORKER_MIN_CONSUMERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
            .max(1);
        let max_consumers = std::env::var("WORKER_MAX_CONSUMERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5)
            .max(min_consumers);

        Self {
            min_consumers,
            max_consumers,
            consume_block: Duration::from_millis(
                std::env::var("WORKER_CONSUME_BLOCK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            scale_interval: Duration::from_secs(
                std::env::var("WORKER_SCALE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            surge_idle_reads: std::env::var("WORKER_SURGE_IDLE_READS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            processed_dir: std::env::var("PROCESSED_DIR")
                .unwrap_or_else(|_| "processed".to_string()),
            thumbnail_dir: std::env::var("THUMBNAIL_DIR")
                .unwrap_or_else(|_| "thumbnails".to_string()),
        }
    }
}
