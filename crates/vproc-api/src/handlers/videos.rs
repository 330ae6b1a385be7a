//! Video submission and status handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use vproc_models::{Priority, VideoId, VideoMetadata, VideoRecord, VideoStatus, DEFAULT_PRIORITY};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::NewSubmission;
use crate::state::AppState;

/// Assumed average pipeline duration used by the progress estimate.
const AVERAGE_PROCESSING_TIME_MS: i64 = 300_000;

// ============================================================================
// Types
// ============================================================================

/// Submit request body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVideoRequest {
    /// Path of the staged upload on disk
    #[validate(length(min = 1, message = "sourcePath is required"))]
    pub source_path: String,

    /// Original filename; derived from sourcePath when absent
    pub filename: Option<String>,

    /// Numeric priority (1-10)
    #[validate(range(min = 1, max = 10, message = "priority must be between 1 and 10"))]
    pub priority: Option<u8>,

    /// Named priority level (HIGH/MEDIUM/LOW); used when `priority` is absent
    pub priority_level: Option<String>,
}

impl SubmitVideoRequest {
    fn effective_priority(&self) -> u8 {
        self.priority
            .or_else(|| {
                self.priority_level
                    .as_deref()
                    .map(|level| Priority::from_level(level).value())
            })
            .unwrap_or(DEFAULT_PRIORITY)
    }
}

/// Job snapshot returned by every video endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<i64>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_ms: Option<i64>,
}

impl ProcessingResponse {
    fn from_record(record: &VideoRecord) -> Self {
        Self {
            video_id: Some(record.id.value()),
            status: record.status.as_str().to_string(),
            message: None,
            progress_percentage: Some(record.progress_percentage),
            thumbnail_path: record.thumbnail_path.clone(),
            processed_path: record.processed_path.clone(),
            error_message: record.error_message.clone(),
            metadata: record.metadata.clone(),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
            processing_start_time: record.processing_start_time,
            processing_end_time: record.processing_end_time,
            estimated_time_remaining_ms: None,
        }
    }

    /// Distinct NOT_FOUND state for unknown ids: no snapshot fields.
    fn not_found() -> Self {
        Self {
            video_id: None,
            status: "NOT_FOUND".to_string(),
            message: Some("Video not found".to_string()),
            progress_percentage: None,
            thumbnail_path: None,
            processed_path: None,
            error_message: None,
            metadata: None,
            created_at: None,
            updated_at: None,
            processing_start_time: None,
            processing_end_time: None,
            estimated_time_remaining_ms: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Delete response.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Heuristic remaining-time estimate from the fixed assumed average.
fn estimated_time_remaining_ms(progress: u8) -> i64 {
    if progress >= 100 {
        return 0;
    }
    AVERAGE_PROCESSING_TIME_MS * (100 - progress as i64) / 100
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/videos
///
/// Accept an upload for asynchronous processing. The record is persisted
/// first; exactly one processing message is published.
pub async fn submit_video(
    State(state): State<AppState>,
    Json(request): Json<SubmitVideoRequest>,
) -> ApiResult<Json<ProcessingResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let priority = request.effective_priority();
    info!(source_path = %request.source_path, priority, "submit_video");

    let record = state
        .submission
        .submit(NewSubmission {
            source_path: request.source_path.into(),
            filename: request.filename,
            priority,
        })
        .await?;

    metrics::record_job_enqueued();

    let mut response = ProcessingResponse::from_record(&record)
        .with_message("Video uploaded successfully. Processing started asynchronously.");
    response.status = "PROCESSING".to_string();
    Ok(Json(response))
}

/// GET /api/videos/:id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProcessingResponse>> {
    match state.store.get(VideoId(id)).await? {
        Some(record) => Ok(Json(ProcessingResponse::from_record(&record))),
        None => Ok(Json(ProcessingResponse::not_found())),
    }
}

/// GET /api/videos/:id/progress
///
/// Status snapshot plus the estimated time remaining.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProcessingResponse>> {
    match state.store.get(VideoId(id)).await? {
        Some(record) => {
            let mut response = ProcessingResponse::from_record(&record);
            response.estimated_time_remaining_ms =
                Some(estimated_time_remaining_ms(record.progress_percentage));
            Ok(Json(response))
        }
        None => Ok(Json(ProcessingResponse::not_found())),
    }
}

/// POST /api/videos/:id/cancel
///
/// Cancellation is advisory: it flips the persisted record, and the
/// pipeline notices between stages. Completed and failed jobs cannot be
/// cancelled.
pub async fn cancel_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProcessingResponse>> {
    let Some(mut record) = state.store.get(VideoId(id)).await? else {
        return Ok(Json(ProcessingResponse::not_found()));
    };

    if matches!(record.status, VideoStatus::Completed | VideoStatus::Failed) {
        return Ok(Json(
            ProcessingResponse::from_record(&record)
                .with_message("Cannot cancel completed or failed processing"),
        ));
    }

    record.cancel();
    state.store.save(&record).await?;
    info!(video_id = %record.id, "Processing cancelled");

    Ok(Json(
        ProcessingResponse::from_record(&record).with_message("Processing cancelled successfully"),
    ))
}

/// GET /api/videos
pub async fn list_videos(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProcessingResponse>>> {
    let records = state.store.list().await?;
    Ok(Json(records.iter().map(ProcessingResponse::from_record).collect()))
}

/// GET /api/videos/active
///
/// Snapshots filtered to in-progress statuses.
pub async fn list_active(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProcessingResponse>>> {
    let records = state.store.list().await?;
    Ok(Json(
        records
            .iter()
            .filter(|r| r.status.is_in_progress())
            .map(ProcessingResponse::from_record)
            .collect(),
    ))
}

/// DELETE /api/videos/:id
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.store.delete(VideoId(id)).await?;
    if deleted {
        info!(video_id = id, "Video record deleted");
    }
    Ok(Json(DeleteResponse { deleted }))
}
