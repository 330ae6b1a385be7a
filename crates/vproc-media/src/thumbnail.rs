//! Thumbnail extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use vproc_models::encoding::{THUMBNAIL_OFFSET, THUMBNAIL_QUALITY, THUMBNAIL_SCALE};

/// Extract a single frame from the source video as a thumbnail image.
///
/// The frame is taken at a fixed offset and scaled to a fixed resolution.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(THUMBNAIL_OFFSET)
        .single_frame()
        .video_filter(format!("scale={}", THUMBNAIL_SCALE))
        .frame_quality(THUMBNAIL_QUALITY);

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_command_shape() {
        let cmd = FfmpegCommand::new("in.mp4", "out.jpg")
            .seek(THUMBNAIL_OFFSET)
            .single_frame()
            .video_filter(format!("scale={}", THUMBNAIL_SCALE))
            .frame_quality(THUMBNAIL_QUALITY);

        let args = cmd.build_args();
        assert!(args.contains(&"00:00:05".to_string()));
        assert!(args.contains(&"scale=320:240".to_string()));
        assert!(args.contains(&"-q:v".to_string()));
        assert!(args.contains(&"2".to_string()));
    }
}
