//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Media error: {0}")]
    Media(#[from] vproc_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] vproc_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vproc_queue::QueueError),

    #[error("{0}")]
    InvalidTransition(#[from] vproc_models::TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
