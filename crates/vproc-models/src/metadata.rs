//! Probe metadata extracted by FFprobe.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured probe result stored on the record after a successful
/// metadata-extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec name
    pub codec: String,
    /// Frame rate (fps)
    pub frame_rate: f64,
    /// Container format name
    pub format: String,
    /// Overall bitrate in bits/second
    pub bitrate: u64,
    /// Audio codec name, if an audio stream is present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Audio channel count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u32>,
    /// Audio sample rate in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
}

impl VideoMetadata {
    /// Resolution as a "WxH" string.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_string() {
        let meta = VideoMetadata {
            duration: 120.0,
            width: 1280,
            height: 720,
            codec: "h264".to_string(),
            frame_rate: 30.0,
            format: "mp4".to_string(),
            bitrate: 1_000_000,
            audio_codec: Some("aac".to_string()),
            audio_channels: Some(2),
            audio_sample_rate: Some(44_100),
        };
        assert_eq!(meta.resolution(), "1280x720");
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let meta = VideoMetadata {
            duration: 10.0,
            width: 640,
            height: 360,
            codec: "h264".to_string(),
            frame_rate: 25.0,
            format: "mp4".to_string(),
            bitrate: 800_000,
            audio_codec: None,
            audio_channels: None,
            audio_sample_rate: None,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"frameRate\""));
        assert!(!json.contains("audioCodec"));
    }
}
