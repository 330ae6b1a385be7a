//! Video transcoding to the fixed delivery format.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use vproc_models::encoding::{
    AUDIO_BITRATE, AUDIO_CODEC, TRANSCODE_CRF, TRANSCODE_MOVFLAGS, TRANSCODE_PRESET,
    TRANSCODE_SCALE, VIDEO_BITRATE, VIDEO_CODEC,
};

/// Re-encode video and audio to the fixed target codecs, bitrates, and
/// resolution, with fast-start metadata placement.
pub async fn transcode_video(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input_path.as_ref(), output_path.as_ref())
        .video_codec(VIDEO_CODEC)
        .audio_codec(AUDIO_CODEC)
        .video_bitrate(VIDEO_BITRATE)
        .audio_bitrate(AUDIO_BITRATE)
        .video_filter(format!("scale={}", TRANSCODE_SCALE))
        .preset(TRANSCODE_PRESET)
        .crf(TRANSCODE_CRF)
        .movflags(TRANSCODE_MOVFLAGS);

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_command_shape() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4")
            .video_codec(VIDEO_CODEC)
            .audio_codec(AUDIO_CODEC)
            .video_bitrate(VIDEO_BITRATE)
            .audio_bitrate(AUDIO_BITRATE)
            .video_filter(format!("scale={}", TRANSCODE_SCALE))
            .preset(TRANSCODE_PRESET)
            .crf(TRANSCODE_CRF)
            .movflags(TRANSCODE_MOVFLAGS);

        let args = cmd.build_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"1000k".to_string()));
        assert!(args.contains(&"128k".to_string()));
        assert!(args.contains(&"scale=1280:720".to_string()));
        assert!(args.contains(&"medium".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }
}
