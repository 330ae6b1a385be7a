//! Encoding configuration constants for the pipeline stages.

/// Thumbnail extraction offset into the source video.
pub const THUMBNAIL_OFFSET: &str = "00:00:05";
/// Thumbnail output resolution.
pub const THUMBNAIL_SCALE: &str = "320:240";
/// Thumbnail JPEG quality (`-q:v`, lower is better).
pub const THUMBNAIL_QUALITY: u8 = 2;

/// Target video codec (H.264).
pub const VIDEO_CODEC: &str = "libx264";
/// Target audio codec.
pub const AUDIO_CODEC: &str = "aac";
/// Target video bitrate.
pub const VIDEO_BITRATE: &str = "1000k";
/// Target audio bitrate.
pub const AUDIO_BITRATE: &str = "128k";
/// Target output resolution.
pub const TRANSCODE_SCALE: &str = "1280:720";
/// Encoding preset.
pub const TRANSCODE_PRESET: &str = "medium";
/// Constant Rate Factor (quality, 0-51, lower is better).
pub const TRANSCODE_CRF: u8 = 23;
/// Container flags: move the moov atom up front for streaming playback.
pub const TRANSCODE_MOVFLAGS: &str = "+faststart";

/// Suffix appended to the source filename for thumbnail outputs.
pub const THUMBNAIL_SUFFIX: &str = "_thumb.jpg";
/// Suffix appended to the source filename for transcoded outputs.
pub const PROCESSED_SUFFIX: &str = "_processed.mp4";
