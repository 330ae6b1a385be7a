//! Per-job processing pipeline.
//!
//! Each stage persists its status transition immediately so concurrent
//! status reads observe intermediate progress. The record is reloaded
//! between stages: a record that became terminal externally (cancelled or
//! deleted) halts the pipeline without being overwritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use vproc_media::MediaResult;
use vproc_models::encoding::{PROCESSED_SUFFIX, THUMBNAIL_SUFFIX};
use vproc_models::{VideoId, VideoMetadata, VideoRecord, VideoStatus};
use vproc_store::VideoStore;

use crate::error::WorkerResult;

/// Output directories for pipeline artifacts.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    processed_dir: PathBuf,
    thumbnail_dir: PathBuf,
}

impl OutputPaths {
    /// Create output paths from the configured directories.
    pub fn new(processed_dir: impl Into<PathBuf>, thumbnail_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            thumbnail_dir: thumbnail_dir.into(),
        }
    }

    /// Thumbnail output path for a stored filename.
    pub fn thumbnail_path(&self, filename: &str) -> PathBuf {
        self.thumbnail_dir.join(format!("{}{}", filename, THUMBNAIL_SUFFIX))
    }

    /// Transcoded output path for a stored filename.
    pub fn processed_path(&self, filename: &str) -> PathBuf {
        self.processed_dir.join(format!("{}{}", filename, PROCESSED_SUFFIX))
    }

    /// Ensure both output directories exist.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.processed_dir).await?;
        tokio::fs::create_dir_all(&self.thumbnail_dir).await?;
        Ok(())
    }
}

/// The external tool invocations backing each stage.
///
/// The worker runs the real FFmpeg/FFprobe implementation; tests substitute
/// a scripted one.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()>;
    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()>;
    async fn probe(&self, input: &Path) -> MediaResult<VideoMetadata>;
}

/// Stage runner backed by the external FFmpeg/FFprobe tools.
#[derive(Debug, Default)]
pub struct FfmpegStages;

#[async_trait]
impl StageRunner for FfmpegStages {
    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        vproc_media::generate_thumbnail(input, output).await
    }

    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()> {
        vproc_media::transcode_video(input, output).await
    }

    async fn probe(&self, input: &Path) -> MediaResult<VideoMetadata> {
        vproc_media::probe_video(input).await
    }
}

/// Shared context for pipeline runs.
pub struct PipelineContext {
    pub store: Arc<VideoStore>,
    pub stages: Arc<dyn StageRunner>,
    pub paths: OutputPaths,
}

/// How a pipeline run ended when no stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All stages finished; the record is Completed
    Completed,
    /// The record became terminal (or was deleted) externally; the
    /// pipeline stopped without touching it further
    Cancelled,
}

/// Run the full pipeline against a record.
///
/// Stage errors propagate to the caller, which persists the failure and
/// rejects the message; nothing here acknowledges or rejects.
pub async fn run(ctx: &PipelineContext, mut record: VideoRecord) -> WorkerResult<PipelineOutcome> {
    let id = record.id;

    if !still_active(ctx, id).await? {
        return Ok(PipelineOutcome::Cancelled);
    }
    record.begin_processing()?;
    ctx.store.save(&record).await?;
    info!(video_id = %id, "Pipeline started");

    // Thumbnail
    if !advance(ctx, &mut record, VideoStatus::ThumbnailCreating).await? {
        return Ok(PipelineOutcome::Cancelled);
    }
    let thumbnail = ctx.paths.thumbnail_path(&record.filename);
    ctx.stages
        .thumbnail(Path::new(&record.original_path), &thumbnail)
        .await?;
    record.set_thumbnail_path(thumbnail.to_string_lossy());
    if !advance(ctx, &mut record, VideoStatus::ThumbnailCreated).await? {
        return Ok(PipelineOutcome::Cancelled);
    }

    // Transcode
    if !advance(ctx, &mut record, VideoStatus::Transcoding).await? {
        return Ok(PipelineOutcome::Cancelled);
    }
    let processed = ctx.paths.processed_path(&record.filename);
    ctx.stages
        .transcode(Path::new(&record.original_path), &processed)
        .await?;
    record.set_processed_path(processed.to_string_lossy());
    if !advance(ctx, &mut record, VideoStatus::Transcoded).await? {
        return Ok(PipelineOutcome::Cancelled);
    }

    // Metadata
    if !advance(ctx, &mut record, VideoStatus::MetadataExtracting).await? {
        return Ok(PipelineOutcome::Cancelled);
    }
    let metadata = ctx.stages.probe(Path::new(&record.original_path)).await?;
    record.set_metadata(metadata);

    if !still_active(ctx, id).await? {
        return Ok(PipelineOutcome::Cancelled);
    }
    record.complete()?;
    ctx.store.save(&record).await?;
    info!(video_id = %id, "Pipeline completed");

    Ok(PipelineOutcome::Completed)
}

/// Check whether the persisted record still accepts pipeline writes.
async fn still_active(ctx: &PipelineContext, id: VideoId) -> WorkerResult<bool> {
    match ctx.store.get(id).await? {
        Some(current) if current.status.is_terminal() => {
            info!(
                video_id = %id,
                status = %current.status,
                "Record became terminal externally, halting pipeline"
            );
            Ok(false)
        }
        Some(_) => Ok(true),
        None => {
            warn!(video_id = %id, "Record deleted mid-pipeline, halting");
            Ok(false)
        }
    }
}

/// Persist the next status transition, unless the record became terminal
/// externally.
async fn advance(
    ctx: &PipelineContext,
    record: &mut VideoRecord,
    next: VideoStatus,
) -> WorkerResult<bool> {
    if !still_active(ctx, record.id).await? {
        return Ok(false);
    }
    record.transition(next)?;
    ctx.store.save(record).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vproc_media::MediaError;
    use vproc_store::VideoStore;

    #[test]
    fn test_output_paths() {
        let paths = OutputPaths::new("processed", "thumbnails");
        assert_eq!(
            paths.thumbnail_path("1700_clip.mp4"),
            PathBuf::from("thumbnails/1700_clip.mp4_thumb.jpg")
        );
        assert_eq!(
            paths.processed_path("1700_clip.mp4"),
            PathBuf::from("processed/1700_clip.mp4_processed.mp4")
        );
    }

    /// Scripted stage runner: records the stage order and fails on demand.
    struct ScriptedStages {
        calls: Mutex<Vec<&'static str>>,
        fail_on: Option<&'static str>,
    }

    impl ScriptedStages {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            }
        }

        fn record(&self, stage: &'static str) -> MediaResult<()> {
            self.calls.lock().unwrap().push(stage);
            if self.fail_on == Some(stage) {
                return Err(MediaError::ffmpeg_failed(
                    format!("{} stage failed", stage),
                    Some("simulated".to_string()),
                    Some(1),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StageRunner for ScriptedStages {
        async fn thumbnail(&self, _input: &Path, _output: &Path) -> MediaResult<()> {
            self.record("thumbnail")
        }

        async fn transcode(&self, _input: &Path, _output: &Path) -> MediaResult<()> {
            self.record("transcode")
        }

        async fn probe(&self, _input: &Path) -> MediaResult<VideoMetadata> {
            self.record("probe")?;
            Ok(VideoMetadata {
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
            })
        }
    }

    async fn test_context(fail_on: Option<&'static str>) -> (PipelineContext, Arc<ScriptedStages>) {
        let stages = Arc::new(ScriptedStages::new(fail_on));
        let ctx = PipelineContext {
            store: Arc::new(VideoStore::from_env().unwrap()),
            stages: stages.clone(),
            paths: OutputPaths::new("processed", "thumbnails"),
        };
        (ctx, stages)
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_successful_run_walks_all_stages() {
        let (ctx, stages) = test_context(None).await;
        let record = ctx.store.create("clip.mp4", "uploads/clip.mp4", None).await.unwrap();
        let id = record.id;

        let outcome = run(&ctx, record).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed);
        assert_eq!(
            *stages.calls.lock().unwrap(),
            vec!["thumbnail", "transcode", "probe"]
        );

        let final_record = ctx.store.get(id).await.unwrap().unwrap();
        assert_eq!(final_record.status, VideoStatus::Completed);
        assert_eq!(final_record.progress_percentage, 100);
        assert!(final_record.thumbnail_path.is_some());
        assert!(final_record.processed_path.is_some());
        assert!(final_record.metadata.is_some());
        assert!(final_record.processing_end_time.is_some());
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_transcode_failure_propagates() {
        let (ctx, _stages) = test_context(Some("transcode")).await;
        let record = ctx.store.create("clip.mp4", "uploads/clip.mp4", None).await.unwrap();
        let id = record.id;

        let err = run(&ctx, record).await.unwrap_err();
        assert!(err.to_string().contains("transcode"));

        // The pipeline leaves the record mid-flight; the executor persists
        // the failure before rejecting the message.
        let current = ctx.store.get(id).await.unwrap().unwrap();
        assert_eq!(current.status, VideoStatus::Transcoding);
    }

    /// Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_externally_cancelled_record_is_not_overwritten() {
        let (ctx, _stages) = test_context(None).await;
        let mut record = ctx.store.create("clip.mp4", "uploads/clip.mp4", None).await.unwrap();
        let id = record.id;

        // Cancel before the pipeline starts
        record.cancel();
        ctx.store.save(&record).await.unwrap();

        let outcome = run(&ctx, ctx.store.get(id).await.unwrap().unwrap()).await;
        // The stored record is terminal, so the pipeline halts immediately
        assert!(matches!(outcome, Ok(PipelineOutcome::Cancelled)));

        let current = ctx.store.get(id).await.unwrap().unwrap();
        assert_eq!(current.status, VideoStatus::Cancelled);
        assert_eq!(current.progress_percentage, 0);
    }
}
