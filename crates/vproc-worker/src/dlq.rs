//! Dead letter queue handler.
//!
//! The terminal sink for failed processing: marks the referenced record
//! FAILED (if it is not already terminal) and acknowledges. Nothing reads
//! from the DLQ afterward; there is no retry logic here.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vproc_queue::{DlqDelivery, JobQueue};
use vproc_store::VideoStore;

/// Fixed explanatory message recorded on dead-lettered jobs.
pub const DLQ_FAILURE_MESSAGE: &str = "Processing failed and moved to dead letter queue";

/// Dead letter queue consumer.
pub struct DlqHandler {
    queue: Arc<JobQueue>,
    store: Arc<VideoStore>,
    consumer: String,
}

impl DlqHandler {
    /// Create a new handler.
    pub fn new(queue: Arc<JobQueue>, store: Arc<VideoStore>) -> Self {
        Self {
            queue,
            store,
            consumer: format!("dlq-handler-{}", Uuid::new_v4()),
        }
    }

    /// Consume the DLQ until shutdown.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) {
        info!("DLQ handler '{}' started", self.consumer);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.queue.consume_dlq(&self.consumer, Duration::from_secs(1)).await {
                Ok(Some(delivery)) => self.handle(delivery).await,
                Ok(None) => {}
                Err(e) => {
                    error!("DLQ handler failed to read: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        info!("DLQ handler stopped");
    }

    async fn handle(&self, delivery: DlqDelivery) {
        counter!("vproc_jobs_dead_lettered_total").increment(1);

        match &delivery.message {
            Some(message) => {
                warn!(
                    video_id = %message.video_id,
                    error = delivery.error.as_deref().unwrap_or("unknown"),
                    "Dead-lettered message received"
                );

                match self.store.get(message.video_id).await {
                    Ok(Some(mut record)) if !record.status.is_terminal() => {
                        record.fail(DLQ_FAILURE_MESSAGE);
                        if let Err(e) = self.store.save(&record).await {
                            error!(
                                video_id = %message.video_id,
                                "Failed to finalize dead-lettered record: {}", e
                            );
                        }
                    }
                    Ok(Some(record)) => {
                        // Already FAILED or CANCELLED: leave it untouched
                        debug!(
                            video_id = %message.video_id,
                            status = %record.status,
                            "Dead-lettered record already terminal"
                        );
                    }
                    Ok(None) => {
                        debug!(
                            video_id = %message.video_id,
                            "Dead-lettered message references no record"
                        );
                    }
                    Err(e) => {
                        error!(
                            video_id = %message.video_id,
                            "Failed to load dead-lettered record: {}", e
                        );
                    }
                }
            }
            None => {
                warn!(
                    message_id = %delivery.message_id,
                    "Dead-lettered entry carries no parseable payload"
                );
            }
        }

        if let Err(e) = self.queue.ack_dlq(&delivery.message_id).await {
            error!(message_id = %delivery.message_id, "Failed to ack DLQ message: {}", e);
        }
    }
}
