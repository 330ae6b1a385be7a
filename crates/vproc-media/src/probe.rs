//! FFprobe metadata extraction.

use std::path::Path;
use std::process::Stdio;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use vproc_models::VideoMetadata;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

/// Probe a video file for metadata.
///
/// Runs `ffprobe -print_format json -show_format -show_streams` against the
/// source. A non-zero exit fails the stage; so does output that cannot be
/// parsed into the metadata shape.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    debug!("Probing video: {}", path.display());

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!(
                "FFprobe exited with status {}",
                output.status.code().unwrap_or(-1)
            ),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse raw FFprobe JSON into the metadata shape.
fn parse_probe_output(raw: &[u8]) -> MediaResult<VideoMetadata> {
    let probe: FfprobeOutput =
        serde_json::from_slice(raw).map_err(|e| MediaError::metadata_parse(e.to_string()))?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let bitrate = probe
        .format
        .bit_rate
        .as_ref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let frame_rate = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        frame_rate,
        format: probe.format.format_name.unwrap_or_default(),
        bitrate,
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        audio_channels: audio_stream.and_then(|s| s.channels),
        audio_sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_ref())
            .and_then(|r| r.parse::<u32>().ok()),
    })
}

/// Parse a frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30000/1001"
            },
            {
                "codec_type": "audio",
                "codec_name": "aac",
                "channels": 2,
                "sample_rate": "44100"
            }
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "120.500000",
            "bit_rate": "1000000"
        }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let meta = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert!((meta.duration - 120.5).abs() < 0.001);
        assert_eq!(meta.resolution(), "1280x720");
        assert_eq!(meta.codec, "h264");
        assert!((meta.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(meta.bitrate, 1_000_000);
        assert_eq!(meta.audio_codec.as_deref(), Some("aac"));
        assert_eq!(meta.audio_channels, Some(2));
        assert_eq!(meta.audio_sample_rate, Some(44_100));
    }

    #[test]
    fn test_unparseable_output_is_a_metadata_parse_error() {
        let err = parse_probe_output(b"not json at all").unwrap_err();
        assert!(matches!(err, MediaError::MetadataParse(_)));
    }

    #[test]
    fn test_missing_video_stream() {
        let json = r#"{"streams": [], "format": {"duration": "1.0"}}"#;
        let err = parse_probe_output(json.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("30/0").is_none());
    }
}
