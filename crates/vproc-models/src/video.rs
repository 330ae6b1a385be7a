//! Video job record and status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::metadata::VideoMetadata;

/// Unique identifier for a video job record.
///
/// Assigned by the record store at creation and immutable afterwards. The
/// id is the sole correlation key between the persisted record and an
/// in-flight queue message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct VideoId(pub i64);

impl VideoId {
    /// Get the inner numeric value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VideoId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Video processing status.
///
/// Successful runs advance one step at a time:
/// `Uploaded → Processing → ThumbnailCreating → ThumbnailCreated →
/// Transcoding → Transcoded → MetadataExtracting → Completed`.
/// `Failed` and `Cancelled` are reachable from every non-terminal state.
/// `Completed`, `Failed`, and `Cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    /// Record created, message not yet consumed
    #[default]
    Uploaded,
    /// A worker picked the job up
    Processing,
    /// Thumbnail extraction running
    ThumbnailCreating,
    /// Thumbnail written to disk
    ThumbnailCreated,
    /// Transcode running
    Transcoding,
    /// Transcoded output written to disk
    Transcoded,
    /// Metadata probe running
    MetadataExtracting,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline failed; `error_message` carries the diagnostic
    Failed,
    /// Cancelled externally
    Cancelled,
}

impl VideoStatus {
    /// Get the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "UPLOADED",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::ThumbnailCreating => "THUMBNAIL_CREATING",
            VideoStatus::ThumbnailCreated => "THUMBNAIL_CREATED",
            VideoStatus::Transcoding => "TRANSCODING",
            VideoStatus::Transcoded => "TRANSCODED",
            VideoStatus::MetadataExtracting => "METADATA_EXTRACTING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::Failed => "FAILED",
            VideoStatus::Cancelled => "CANCELLED",
        }
    }

    /// Progress percentage persisted alongside this status.
    pub fn progress(&self) -> u8 {
        match self {
            VideoStatus::Uploaded => 0,
            VideoStatus::Processing => 10,
            VideoStatus::ThumbnailCreating => 25,
            VideoStatus::ThumbnailCreated => 40,
            VideoStatus::Transcoding => 50,
            VideoStatus::Transcoded => 75,
            VideoStatus::MetadataExtracting => 85,
            VideoStatus::Completed => 100,
            VideoStatus::Failed | VideoStatus::Cancelled => 0,
        }
    }

    /// Check if this is a terminal state. No transition leaves a terminal
    /// state and no stage code may run against a terminal record.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoStatus::Completed | VideoStatus::Failed | VideoStatus::Cancelled
        )
    }

    /// Check if the pipeline is actively working on the record.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            VideoStatus::Processing
                | VideoStatus::ThumbnailCreating
                | VideoStatus::ThumbnailCreated
                | VideoStatus::Transcoding
                | VideoStatus::Transcoded
                | VideoStatus::MetadataExtracting
        )
    }

    /// The next stage of a successful run, if any.
    pub fn next_stage(&self) -> Option<VideoStatus> {
        match self {
            VideoStatus::Uploaded => Some(VideoStatus::Processing),
            VideoStatus::Processing => Some(VideoStatus::ThumbnailCreating),
            VideoStatus::ThumbnailCreating => Some(VideoStatus::ThumbnailCreated),
            VideoStatus::ThumbnailCreated => Some(VideoStatus::Transcoding),
            VideoStatus::Transcoding => Some(VideoStatus::Transcoded),
            VideoStatus::Transcoded => Some(VideoStatus::MetadataExtracting),
            VideoStatus::MetadataExtracting => Some(VideoStatus::Completed),
            VideoStatus::Completed | VideoStatus::Failed | VideoStatus::Cancelled => None,
        }
    }

    /// Check if `next` is a legal transition from this status: the single
    /// next pipeline step, or Failed/Cancelled from any non-terminal state.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, VideoStatus::Failed | VideoStatus::Cancelled) {
            return true;
        }
        self.next_stage() == Some(next)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: VideoStatus,
    pub to: VideoStatus,
}

/// Persisted video job record.
///
/// One record exists per accepted upload. The record is the single source
/// of truth for job state; every mutation bumps `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique record id
    pub id: VideoId,

    /// Stored filename (timestamp-prefixed)
    pub filename: String,

    /// Path of the uploaded source file
    pub original_path: String,

    /// Path of the transcoded output, set when transcoding completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,

    /// Path of the extracted thumbnail, set when extraction completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: VideoStatus,

    /// Progress percentage (0-100), derived from status
    #[serde(default)]
    pub progress_percentage: u8,

    /// Error message, set only when the record fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Probe result, set only at a successful metadata-extraction stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,

    /// Source file size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When a worker started the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_start_time: Option<DateTime<Utc>>,

    /// When the pipeline reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_end_time: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a new record in the Uploaded state.
    pub fn new(
        id: VideoId,
        filename: impl Into<String>,
        original_path: impl Into<String>,
        file_size: Option<u64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            original_path: original_path.into(),
            processed_path: None,
            thumbnail_path: None,
            status: VideoStatus::Uploaded,
            progress_percentage: 0,
            error_message: None,
            metadata: None,
            file_size,
            created_at: now,
            updated_at: now,
            processing_start_time: None,
            processing_end_time: None,
        }
    }

    /// Advance to the given status, enforcing the state machine. Progress
    /// and `updated_at` follow the status.
    pub fn transition(&mut self, next: VideoStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.progress_percentage = next.progress();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enter the Processing state and stamp the start time.
    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(VideoStatus::Processing)?;
        self.processing_start_time = Some(Utc::now());
        Ok(())
    }

    /// Enter the Completed state and stamp the end time.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(VideoStatus::Completed)?;
        self.processing_end_time = Some(Utc::now());
        Ok(())
    }

    /// Mark the record failed with a diagnostic message.
    ///
    /// Callers must not invoke this on a terminal record; the DLQ handler
    /// and the worker both check `status.is_terminal()` first.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = VideoStatus::Failed;
        self.progress_percentage = 0;
        self.error_message = Some(error.into());
        self.processing_end_time = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Cancel the record: progress resets to 0 and the end time is stamped.
    pub fn cancel(&mut self) {
        self.status = VideoStatus::Cancelled;
        self.progress_percentage = 0;
        self.processing_end_time = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Record the thumbnail output path.
    pub fn set_thumbnail_path(&mut self, path: impl Into<String>) {
        self.thumbnail_path = Some(path.into());
        self.updated_at = Utc::now();
    }

    /// Record the transcoded output path.
    pub fn set_processed_path(&mut self, path: impl Into<String>) {
        self.processed_path = Some(path.into());
        self.updated_at = Utc::now();
    }

    /// Record the probe result.
    pub fn set_metadata(&mut self, metadata: VideoMetadata) {
        self.metadata = Some(metadata);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progress_mapping() {
        assert_eq!(VideoStatus::Uploaded.progress(), 0);
        assert_eq!(VideoStatus::Processing.progress(), 10);
        assert_eq!(VideoStatus::ThumbnailCreating.progress(), 25);
        assert_eq!(VideoStatus::ThumbnailCreated.progress(), 40);
        assert_eq!(VideoStatus::Transcoding.progress(), 50);
        assert_eq!(VideoStatus::Transcoded.progress(), 75);
        assert_eq!(VideoStatus::MetadataExtracting.progress(), 85);
        assert_eq!(VideoStatus::Completed.progress(), 100);
        assert_eq!(VideoStatus::Failed.progress(), 0);
        assert_eq!(VideoStatus::Cancelled.progress(), 0);
    }

    #[test]
    fn test_forward_transitions_only() {
        let order = [
            VideoStatus::Uploaded,
            VideoStatus::Processing,
            VideoStatus::ThumbnailCreating,
            VideoStatus::ThumbnailCreated,
            VideoStatus::Transcoding,
            VideoStatus::Transcoded,
            VideoStatus::MetadataExtracting,
            VideoStatus::Completed,
        ];

        for pair in order.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]), "{} <- {}", pair[0], pair[1]);
        }

        // Skipping a stage is not allowed
        assert!(!VideoStatus::Processing.can_transition_to(VideoStatus::Transcoding));
        assert!(!VideoStatus::Uploaded.can_transition_to(VideoStatus::Completed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let all = [
            VideoStatus::Uploaded,
            VideoStatus::Processing,
            VideoStatus::ThumbnailCreating,
            VideoStatus::ThumbnailCreated,
            VideoStatus::Transcoding,
            VideoStatus::Transcoded,
            VideoStatus::MetadataExtracting,
            VideoStatus::Completed,
            VideoStatus::Failed,
            VideoStatus::Cancelled,
        ];

        for terminal in [VideoStatus::Completed, VideoStatus::Failed, VideoStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }
    }

    #[test]
    fn test_failed_and_cancelled_reachable_from_any_active_state() {
        for status in [
            VideoStatus::Uploaded,
            VideoStatus::Processing,
            VideoStatus::ThumbnailCreating,
            VideoStatus::ThumbnailCreated,
            VideoStatus::Transcoding,
            VideoStatus::Transcoded,
            VideoStatus::MetadataExtracting,
        ] {
            assert!(status.can_transition_to(VideoStatus::Failed));
            assert!(status.can_transition_to(VideoStatus::Cancelled));
        }
    }

    #[test]
    fn test_record_transition_updates_progress() {
        let mut record = VideoRecord::new(VideoId(1), "clip.mp4", "uploads/clip.mp4", Some(1024));
        assert_eq!(record.status, VideoStatus::Uploaded);
        assert_eq!(record.progress_percentage, 0);

        record.begin_processing().unwrap();
        assert_eq!(record.status, VideoStatus::Processing);
        assert_eq!(record.progress_percentage, 10);
        assert!(record.processing_start_time.is_some());

        let err = record.transition(VideoStatus::Transcoding).unwrap_err();
        assert_eq!(err.from, VideoStatus::Processing);
        assert_eq!(err.to, VideoStatus::Transcoding);
    }

    #[test]
    fn test_record_fail_resets_progress() {
        let mut record = VideoRecord::new(VideoId(2), "clip.mp4", "uploads/clip.mp4", None);
        record.begin_processing().unwrap();
        record.transition(VideoStatus::ThumbnailCreating).unwrap();

        record.fail("ffmpeg exited with status 1");
        assert_eq!(record.status, VideoStatus::Failed);
        assert_eq!(record.progress_percentage, 0);
        assert!(record.error_message.is_some());
        assert!(record.processing_end_time.is_some());
    }

    #[test]
    fn test_record_cancel() {
        let mut record = VideoRecord::new(VideoId(3), "clip.mp4", "uploads/clip.mp4", None);
        record.begin_processing().unwrap();
        record.transition(VideoStatus::ThumbnailCreating).unwrap();
        record.transition(VideoStatus::ThumbnailCreated).unwrap();
        record.transition(VideoStatus::Transcoding).unwrap();

        record.cancel();
        assert_eq!(record.status, VideoStatus::Cancelled);
        assert_eq!(record.progress_percentage, 0);
        assert!(record.processing_end_time.is_some());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&VideoStatus::ThumbnailCreating).unwrap();
        assert_eq!(json, "\"THUMBNAIL_CREATING\"");

        let parsed: VideoStatus = serde_json::from_str("\"METADATA_EXTRACTING\"").unwrap();
        assert_eq!(parsed, VideoStatus::MetadataExtracting);
        assert_eq!(parsed.as_str(), "METADATA_EXTRACTING");
    }
}
