//! Worker pool: bounded concurrent consumers over the job queue.
//!
//! Each consumer fetches at most one unacknowledged message at a time and
//! runs the full pipeline to completion before reading again. The pool
//! keeps `min_consumers` alive and adds surge consumers up to
//! `max_consumers` while a backlog exists; surge consumers retire after a
//! run of empty reads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vproc_queue::{Delivery, JobQueue};
use vproc_store::VideoStore;

use crate::config::WorkerConfig;
use crate::dlq::DlqHandler;
use crate::error::WorkerResult;
use crate::pipeline::{self, FfmpegStages, OutputPaths, PipelineContext, PipelineOutcome, StageRunner};

/// Worker pool that consumes and processes jobs.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    store: Arc<VideoStore>,
    stages: Arc<dyn StageRunner>,
    shutdown: watch::Sender<bool>,
    active_consumers: Arc<AtomicUsize>,
    next_consumer_id: AtomicUsize,
    base_name: String,
}

impl WorkerPool {
    /// Create a new worker pool with the real FFmpeg stage runner.
    pub fn new(config: WorkerConfig, queue: JobQueue, store: VideoStore) -> Self {
        Self::with_stages(config, queue, store, Arc::new(FfmpegStages))
    }

    /// Create a worker pool with a custom stage runner.
    pub fn with_stages(
        config: WorkerConfig,
        queue: JobQueue,
        store: VideoStore,
        stages: Arc<dyn StageRunner>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let base_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            store: Arc::new(store),
            stages,
            shutdown,
            active_consumers: Arc::new(AtomicUsize::new(0)),
            next_consumer_id: AtomicUsize::new(0),
            base_name,
        }
    }

    /// Start the pool and run until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting worker pool '{}' ({}-{} consumers)",
            self.base_name, self.config.min_consumers, self.config.max_consumers
        );

        // Topology must exist before any consume begins
        self.queue.declare_topology().await?;

        let paths = OutputPaths::new(&self.config.processed_dir, &self.config.thumbnail_dir);
        paths.ensure_dirs().await?;

        let ctx = Arc::new(PipelineContext {
            store: Arc::clone(&self.store),
            stages: Arc::clone(&self.stages),
            paths,
        });

        // Terminal sink for rejected and expired messages
        let dlq = DlqHandler::new(Arc::clone(&self.queue), Arc::clone(&self.store));
        let dlq_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move { dlq.run(dlq_shutdown).await });

        for _ in 0..self.config.min_consumers {
            self.spawn_consumer(Arc::clone(&ctx), false);
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut interval = tokio::time::interval(self.config.scale_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping worker pool");
                        break;
                    }
                }
                _ = interval.tick() => {
                    match self.queue.len().await {
                        Ok(backlog) if backlog > 0 => {
                            let active = self.active_consumers.load(Ordering::SeqCst);
                            if active < self.config.max_consumers {
                                info!(
                                    "Backlog of {} with {} consumers, adding surge consumer",
                                    backlog, active
                                );
                                self.spawn_consumer(Arc::clone(&ctx), true);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Failed to read queue length: {}", e),
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_consumers()).await;

        info!("Worker pool stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn spawn_consumer(&self, ctx: Arc<PipelineContext>, surge: bool) {
        let id = self.next_consumer_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{}", self.base_name, id);
        let queue = Arc::clone(&self.queue);
        let active = Arc::clone(&self.active_consumers);
        let shutdown_rx = self.shutdown.subscribe();
        let block = self.config.consume_block;
        let surge_idle_reads = self.config.surge_idle_reads;

        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            consumer_loop(ctx, queue, name, surge, surge_idle_reads, block, shutdown_rx).await;
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn wait_for_consumers(&self) {
        loop {
            if self.active_consumers.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// One consumer: fetch one message, process it fully, repeat.
async fn consumer_loop(
    ctx: Arc<PipelineContext>,
    queue: Arc<JobQueue>,
    name: String,
    surge: bool,
    surge_idle_reads: u32,
    block: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    debug!("Consumer {} started (surge={})", name, surge);
    let mut empty_reads = 0u32;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match queue.consume_one(&name, block).await {
            Ok(Some(delivery)) => {
                empty_reads = 0;
                process_delivery(&ctx, &queue, delivery).await;
            }
            Ok(None) => {
                empty_reads += 1;
                if surge && empty_reads >= surge_idle_reads {
                    debug!("Surge consumer {} retiring after idle reads", name);
                    break;
                }
            }
            Err(e) => {
                error!("Consumer {} failed to read from queue: {}", name, e);
                // Back off on error
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    debug!("Consumer {} stopped", name);
}

/// Process one delivery end to end, then acknowledge or reject it.
async fn process_delivery(ctx: &Arc<PipelineContext>, queue: &JobQueue, delivery: Delivery) {
    let message = delivery.message.clone();
    let video_id = message.video_id;

    let record = match ctx.store.get(video_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            // Non-recoverable message: there is no job to fail
            warn!(video_id = %video_id, "No job record for message, rejecting without requeue");
            if let Err(e) = queue
                .reject(&delivery.message_id, &message, "No job record for message")
                .await
            {
                error!(video_id = %video_id, "Failed to reject message: {}", e);
            }
            return;
        }
        Err(e) => {
            error!(video_id = %video_id, "Failed to load record: {}", e);
            if let Err(qe) = queue
                .reject(
                    &delivery.message_id,
                    &message,
                    &format!("Record load failed: {}", e),
                )
                .await
            {
                error!(video_id = %video_id, "Failed to reject message: {}", qe);
            }
            return;
        }
    };

    match pipeline::run(ctx, record).await {
        Ok(PipelineOutcome::Completed) => {
            counter!("vproc_jobs_completed_total").increment(1);
            if let Err(e) = queue.ack(&delivery.message_id).await {
                error!(video_id = %video_id, "Failed to ack message: {}", e);
            }
        }
        Ok(PipelineOutcome::Cancelled) => {
            // A cancelled job is not a processing failure
            info!(video_id = %video_id, "Pipeline halted by external cancellation, acking");
            if let Err(e) = queue.ack(&delivery.message_id).await {
                error!(video_id = %video_id, "Failed to ack message: {}", e);
            }
        }
        Err(e) => {
            error!(video_id = %video_id, "Pipeline failed: {}", e);
            counter!("vproc_jobs_failed_total").increment(1);

            match ctx.store.get(video_id).await {
                Ok(Some(mut record)) if !record.status.is_terminal() => {
                    record.fail(e.to_string());
                    if let Err(se) = ctx.store.save(&record).await {
                        error!(video_id = %video_id, "Failed to persist failure: {}", se);
                    }
                }
                Ok(_) => {}
                Err(se) => {
                    error!(video_id = %video_id, "Failed to load record for failure: {}", se);
                }
            }

            if let Err(qe) = queue.reject(&delivery.message_id, &message, &e.to_string()).await {
                error!(video_id = %video_id, "Failed to reject message: {}", qe);
            }
        }
    }
}
