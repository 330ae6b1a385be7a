//! FFmpeg CLI wrapper for the video processing stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Thumbnail extraction, transcoding, and metadata probing
//! - The exit-code contract: success is exit code 0, captured stderr is the
//!   diagnostic text otherwise

pub mod command;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::probe_video;
pub use thumbnail::generate_thumbnail;
pub use transcode::transcode_video;
