//! Job submission: persist the record, then publish the message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use vproc_queue::{JobQueue, ProcessingMessage, QueueError};
use vproc_store::{StoreError, VideoStore};
use vproc_models::VideoRecord;

/// Submission failure taxonomy.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to publish processing message: {0}")]
    Publish(#[source] QueueError),
}

/// An accepted upload to submit for processing.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    /// Path of the staged upload on disk
    pub source_path: PathBuf,
    /// Original filename; derived from the source path when absent
    pub filename: Option<String>,
    /// Broker priority (1-10)
    pub priority: u8,
}

/// Persists a new job record and publishes its processing message.
#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<VideoStore>,
    queue: Arc<JobQueue>,
    upload_dir: PathBuf,
}

impl SubmissionService {
    /// Create a new submission service.
    pub fn new(store: Arc<VideoStore>, queue: Arc<JobQueue>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            queue,
            upload_dir: upload_dir.into(),
        }
    }

    /// Accept an upload: move it into the upload directory, persist a
    /// record in the Uploaded state, and publish exactly one processing
    /// message.
    ///
    /// If the publish fails, the record is transitioned to FAILED before
    /// the error is surfaced — a job never stays silently at UPLOADED with
    /// no message outstanding.
    pub async fn submit(&self, submission: NewSubmission) -> Result<VideoRecord, SubmissionError> {
        let source = &submission.source_path;

        let file_meta = tokio::fs::metadata(source)
            .await
            .map_err(|_| SubmissionError::SourceMissing(source.clone()))?;
        if !file_meta.is_file() {
            return Err(SubmissionError::SourceMissing(source.clone()));
        }

        let original_name = submission.filename.unwrap_or_else(|| {
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string())
        });
        let stored_name = format!("{}_{}", Utc::now().timestamp_millis(), original_name);

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let dest = self.upload_dir.join(&stored_name);
        stage_file(source, &dest).await?;

        let record = self
            .store
            .create(stored_name.as_str(), dest.to_string_lossy(), Some(file_meta.len()))
            .await?;

        let message =
            ProcessingMessage::new(record.id, record.original_path.clone(), record.filename.clone())
                .with_priority(submission.priority);

        match self.queue.publish(&message).await {
            Ok(message_id) => {
                info!(
                    video_id = %record.id,
                    message_id = %message_id,
                    "Submitted video for processing"
                );
                Ok(record)
            }
            Err(e) => {
                let mut failed = record;
                failed.fail(format!("Failed to publish processing message: {}", e));
                if let Err(se) = self.store.save(&failed).await {
                    error!(video_id = %failed.id, "Failed to persist publish failure: {}", se);
                }
                Err(SubmissionError::Publish(e))
            }
        }
    }
}

/// Move a file into place, falling back to copy+remove across filesystems.
async fn stage_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(source, dest).await?;
            tokio::fs::remove_file(source).await
        }
    }
}
