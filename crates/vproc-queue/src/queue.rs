//! Job queue using Redis Streams.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::ProcessingMessage;

/// Default per-message TTL: one hour.
pub const DEFAULT_MESSAGE_TTL_MS: u64 = 3_600_000;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Main stream name
    pub stream_name: String,
    /// Worker consumer group on the main stream
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream_name: String,
    /// Consumer group on the dead letter stream
    pub dlq_consumer_group: String,
    /// Per-message TTL applied at publish time
    pub message_ttl_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vproc:processing".to_string(),
            consumer_group: "vproc:workers".to_string(),
            dlq_stream_name: "vproc:processing:failed".to_string(),
            dlq_consumer_group: "vproc:dlq-handler".to_string(),
            message_ttl_ms: DEFAULT_MESSAGE_TTL_MS,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vproc:processing".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vproc:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "vproc:processing:failed".to_string()),
            dlq_consumer_group: std::env::var("QUEUE_DLQ_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vproc:dlq-handler".to_string()),
            message_ttl_ms: std::env::var("QUEUE_MESSAGE_TTL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MESSAGE_TTL_MS),
        }
    }
}

/// A message delivered to a consumer, pending acknowledgment.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker message id
    pub message_id: String,
    /// Parsed payload
    pub message: ProcessingMessage,
}

/// A message delivered from the dead letter queue.
#[derive(Debug, Clone)]
pub struct DlqDelivery {
    /// Broker message id on the DLQ stream
    pub message_id: String,
    /// Parsed payload, if the dead-lettered entry carried one
    pub message: Option<ProcessingMessage>,
    /// Error recorded when the message was dead-lettered
    pub error: Option<String>,
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Configured per-message TTL.
    pub fn message_ttl_ms(&self) -> u64 {
        self.config.message_ttl_ms
    }

    /// Declare the broker topology: the main stream with its worker group
    /// and the dead letter stream with its handler group.
    ///
    /// Safe to repeat on every startup; must run before any publish or
    /// consume begins.
    pub async fn declare_topology(&self) -> QueueResult<()> {
        self.create_group(&self.config.stream_name, &self.config.consumer_group)
            .await?;
        self.create_group(&self.config.dlq_stream_name, &self.config.dlq_consumer_group)
            .await?;
        Ok(())
    }

    async fn create_group(&self, stream: &str, group: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group {} on {}", group, stream),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group {} already exists on {}", group, stream);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Publish a processing message with its priority and per-message TTL.
    ///
    /// Returns the broker message id.
    pub async fn publish(&self, message: &ProcessingMessage) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(message)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("priority")
            .arg(message.priority)
            .arg("expiration")
            .arg(self.config.message_ttl_ms.to_string())
            .query_async(&mut conn)
            .await?;

        info!(
            "Published message {} for video {} (priority {})",
            message_id, message.video_id, message.priority
        );

        Ok(message_id)
    }

    /// Fetch at most one new message for the given consumer.
    ///
    /// Each consumer holds at most one unacknowledged delivery at a time
    /// (COUNT 1). A message whose TTL elapsed before first delivery is
    /// routed to the DLQ and not returned; so is a malformed payload.
    pub async fn consume_one(
        &self,
        consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entry = match reply.keys.into_iter().next().and_then(|k| k.ids.into_iter().next()) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let message_id = entry.id.clone();
        let payload = match field_string(&entry.map, "job") {
            Some(payload) => payload,
            None => {
                warn!("Message {} carries no job payload", message_id);
                self.dead_letter_raw(&message_id, "", "Missing job payload")
                    .await?;
                return Ok(None);
            }
        };

        let ttl_ms = field_string(&entry.map, "expiration")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(self.config.message_ttl_ms);

        if is_expired(&message_id, ttl_ms, Utc::now().timestamp_millis()) {
            warn!("Message {} expired before delivery", message_id);
            self.dead_letter_raw(&message_id, &payload, "Message expired before delivery")
                .await?;
            return Ok(None);
        }

        match serde_json::from_str::<ProcessingMessage>(&payload) {
            Ok(message) => {
                debug!("Consumer {} received message {}", consumer, message_id);
                Ok(Some(Delivery { message_id, message }))
            }
            Err(e) => {
                warn!("Failed to parse message {}: {}", message_id, e);
                self.dead_letter_raw(&message_id, &payload, "Malformed job payload")
                    .await?;
                Ok(None)
            }
        }
    }

    /// Acknowledge a message (processing finished).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message {}", message_id);
        Ok(())
    }

    /// Reject a message without requeuing: move it to the dead letter
    /// stream exactly once, then acknowledge the original.
    pub async fn reject(
        &self,
        message_id: &str,
        message: &ProcessingMessage,
        error: &str,
    ) -> QueueResult<()> {
        let payload = serde_json::to_string(message)?;
        self.dead_letter_raw(message_id, &payload, error).await?;

        warn!(
            "Rejected message {} for video {}: {}",
            message_id, message.video_id, error
        );
        Ok(())
    }

    async fn dead_letter_raw(
        &self,
        message_id: &str,
        payload: &str,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await
    }

    /// Fetch at most one message from the dead letter queue.
    pub async fn consume_dlq(
        &self,
        consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<DlqDelivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.dlq_consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.dlq_stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entry = match reply.keys.into_iter().next().and_then(|k| k.ids.into_iter().next()) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let message = field_string(&entry.map, "job")
            .and_then(|payload| serde_json::from_str(&payload).ok());

        Ok(Some(DlqDelivery {
            message_id: entry.id,
            message,
            error: field_string(&entry.map, "error"),
        }))
    }

    /// Acknowledge a dead letter delivery.
    pub async fn ack_dlq(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.dlq_stream_name)
            .arg(&self.config.dlq_consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.dlq_stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged DLQ message {}", message_id);
        Ok(())
    }

    /// Get the main queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get the DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }
}

/// Extract a string field from a stream entry.
fn field_string(map: &HashMap<String, redis::Value>, field: &str) -> Option<String> {
    match map.get(field) {
        Some(redis::Value::BulkString(bytes)) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => None,
    }
}

/// Publish timestamp in milliseconds, as encoded in a stream entry id
/// (`<ms>-<seq>`).
fn entry_timestamp_ms(message_id: &str) -> Option<i64> {
    message_id.split_once('-').and_then(|(ms, _)| ms.parse().ok())
}

/// Check whether a message's TTL elapsed before delivery.
fn is_expired(message_id: &str, ttl_ms: u64, now_ms: i64) -> bool {
    match entry_timestamp_ms(message_id) {
        Some(published_ms) => now_ms.saturating_sub(published_ms) > ttl_ms as i64,
        // Unparseable id: deliver rather than drop
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vproc_models::VideoId;

    #[test]
    fn test_entry_timestamp_parsing() {
        assert_eq!(entry_timestamp_ms("1700000000000-0"), Some(1_700_000_000_000));
        assert_eq!(entry_timestamp_ms("1700000000000-42"), Some(1_700_000_000_000));
        assert_eq!(entry_timestamp_ms("garbage"), None);
    }

    #[test]
    fn test_expiry_check() {
        let published = 1_700_000_000_000i64;
        let id = format!("{}-0", published);

        // Within TTL
        assert!(!is_expired(&id, 3_600_000, published + 3_599_999));
        // Past TTL
        assert!(is_expired(&id, 3_600_000, published + 3_600_001));
        // Unparseable ids are delivered, not dropped
        assert!(!is_expired("bad-id-format", 0, published));
    }

    #[test]
    fn test_default_topology_names() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "vproc:processing");
        assert_eq!(config.dlq_stream_name, "vproc:processing:failed");
        assert_ne!(config.consumer_group, config.dlq_consumer_group);
        assert_eq!(config.message_ttl_ms, 3_600_000);
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_publish_consume_ack() {
        let queue = JobQueue::from_env().unwrap();
        queue.declare_topology().await.unwrap();
        // Declaring twice must be safe
        queue.declare_topology().await.unwrap();

        let message = ProcessingMessage::new(VideoId(1), "uploads/a.mp4", "a.mp4");
        queue.publish(&message).await.unwrap();

        let consumer = format!("test-{}", uuid::Uuid::new_v4());
        let delivery = queue
            .consume_one(&consumer, Duration::from_millis(500))
            .await
            .unwrap()
            .expect("expected a delivery");
        assert_eq!(delivery.message.video_id, VideoId(1));

        queue.ack(&delivery.message_id).await.unwrap();
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_reject_routes_to_dlq() {
        let queue = JobQueue::from_env().unwrap();
        queue.declare_topology().await.unwrap();

        let message = ProcessingMessage::new(VideoId(2), "uploads/b.mp4", "b.mp4");
        queue.publish(&message).await.unwrap();

        let consumer = format!("test-{}", uuid::Uuid::new_v4());
        let delivery = queue
            .consume_one(&consumer, Duration::from_millis(500))
            .await
            .unwrap()
            .expect("expected a delivery");

        queue
            .reject(&delivery.message_id, &delivery.message, "stage failed")
            .await
            .unwrap();

        let dlq = queue
            .consume_dlq(&consumer, Duration::from_millis(500))
            .await
            .unwrap()
            .expect("expected a DLQ delivery");
        assert_eq!(dlq.message.unwrap().video_id, VideoId(2));
        assert_eq!(dlq.error.as_deref(), Some("stage failed"));

        queue.ack_dlq(&dlq.message_id).await.unwrap();
    }
}
