//! Queue message types.

use serde::{Deserialize, Serialize};

use vproc_models::{VideoId, DEFAULT_PRIORITY};

/// The only processing type currently published: the full per-job pipeline.
pub const FULL_PROCESSING: &str = "FULL_PROCESSING";

/// Message published for each accepted upload.
///
/// The message carries no identity of its own; `video_id` is the sole
/// correlation key back to the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMessage {
    /// Record id of the video to process
    pub video_id: VideoId,
    /// Path of the uploaded source file
    pub original_path: String,
    /// Stored filename
    pub filename: String,
    /// Processing type tag
    pub processing_type: String,
    /// Broker priority (1-10)
    pub priority: u8,
}

impl ProcessingMessage {
    /// Create a new full-processing message with the default priority.
    pub fn new(
        video_id: VideoId,
        original_path: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            video_id,
            original_path: original_path.into(),
            filename: filename.into(),
            processing_type: FULL_PROCESSING.to_string(),
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let msg = ProcessingMessage::new(VideoId(42), "uploads/clip.mp4", "clip.mp4")
            .with_priority(8);

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"videoId\":42"));
        assert!(json.contains("\"originalPath\":\"uploads/clip.mp4\""));
        assert!(json.contains("\"processingType\":\"FULL_PROCESSING\""));
        assert!(json.contains("\"priority\":8"));

        let parsed: ProcessingMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_default_priority() {
        let msg = ProcessingMessage::new(VideoId(1), "uploads/a.mp4", "a.mp4");
        assert_eq!(msg.priority, DEFAULT_PRIORITY);
        assert_eq!(msg.processing_type, FULL_PROCESSING);
    }
}
