//! Video processing worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vproc_queue::JobQueue;
use vproc_store::VideoStore;
use vproc_worker::{WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vproc=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vproc-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let store = match VideoStore::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create video store: {}", e);
            std::process::exit(1);
        }
    };

    let pool = Arc::new(WorkerPool::new(config, queue, store));

    // Signal shutdown on ctrl-c
    let pool_signal = Arc::clone(&pool);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        pool_signal.shutdown();
    });

    if let Err(e) = pool.run().await {
        error!("Worker pool error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
