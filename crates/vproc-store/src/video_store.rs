//! Video record persistence over Redis.

use redis::AsyncCommands;
use tracing::{debug, warn};

use vproc_models::{VideoId, VideoRecord};

use crate::error::StoreResult;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for record keys and the id counter
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vproc".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "vproc".to_string()),
        }
    }
}

/// Video record store client.
///
/// Records are stored as JSON strings keyed by numeric id; ids are
/// allocated from a Redis counter. Updates are last-write-wins.
pub struct VideoStore {
    client: redis::Client,
    config: StoreConfig,
}

impl VideoStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    fn record_key(&self, id: VideoId) -> String {
        format!("{}:video:{}", self.config.key_prefix, id)
    }

    fn counter_key(&self) -> String {
        format!("{}:video:id", self.config.key_prefix)
    }

    fn index_key(&self) -> String {
        format!("{}:video:index", self.config.key_prefix)
    }

    /// Allocate an id and persist a new record in the Uploaded state.
    pub async fn create(
        &self,
        filename: impl Into<String>,
        original_path: impl Into<String>,
        file_size: Option<u64>,
    ) -> StoreResult<VideoRecord> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let id: i64 = conn.incr(self.counter_key(), 1).await?;
        let record = VideoRecord::new(VideoId(id), filename, original_path, file_size);

        let payload = serde_json::to_string(&record)?;
        conn.set::<_, _, ()>(self.record_key(record.id), payload).await?;
        conn.sadd::<_, _, ()>(self.index_key(), id).await?;

        debug!("Created video record {}", record.id);
        Ok(record)
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: VideoId) -> StoreResult<Option<VideoRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload: Option<String> = conn.get(self.record_key(id)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Persist the current state of a record (last-write-wins).
    pub async fn save(&self, record: &VideoRecord) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(self.record_key(record.id), payload).await?;

        debug!(
            "Saved video record {} status={} progress={}",
            record.id, record.status, record.progress_percentage
        );
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub async fn delete(&self, id: VideoId) -> StoreResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let removed: i64 = conn.del(self.record_key(id)).await?;
        conn.srem::<_, _, ()>(self.index_key(), id.value()).await?;

        Ok(removed > 0)
    }

    /// List all records, ordered by id.
    pub async fn list(&self) -> StoreResult<Vec<VideoRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let ids: Vec<i64> = conn.smembers(self.index_key()).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let payload: Option<String> = conn.get(self.record_key(VideoId(id))).await?;
            match payload {
                Some(json) => match serde_json::from_str(&json) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping unreadable record {}: {}", id, e),
                },
                // Index entry with no record: deleted concurrently
                None => {}
            }
        }

        records.sort_by_key(|r: &VideoRecord| r.id);
        Ok(records)
    }

    /// Connectivity check (PING).
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let store = VideoStore::new(StoreConfig::default()).unwrap();
        assert_eq!(store.record_key(VideoId(42)), "vproc:video:42");
        assert_eq!(store.counter_key(), "vproc:video:id");
        assert_eq!(store.index_key(), "vproc:video:index");
    }

    #[test]
    fn test_record_round_trip() {
        let record = VideoRecord::new(VideoId(7), "clip.mp4", "uploads/clip.mp4", Some(2048));
        let json = serde_json::to_string(&record).unwrap();
        let parsed: VideoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.status, record.status);
        assert_eq!(parsed.file_size, Some(2048));
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_create_get_delete() {
        let store = VideoStore::from_env().unwrap();

        let record = store.create("clip.mp4", "uploads/clip.mp4", Some(1024)).await.unwrap();
        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.filename, "clip.mp4");

        assert!(store.delete(record.id).await.unwrap());
        assert!(store.get(record.id).await.unwrap().is_none());
        assert!(!store.delete(record.id).await.unwrap());
    }
}
