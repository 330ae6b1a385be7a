//! Application state.

use std::sync::Arc;

use vproc_queue::JobQueue;
use vproc_store::VideoStore;

use crate::config::ApiConfig;
use crate::services::SubmissionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<VideoStore>,
    pub queue: Arc<JobQueue>,
    pub submission: SubmissionService,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = Arc::new(VideoStore::from_env()?);
        let queue = Arc::new(JobQueue::from_env()?);
        let submission =
            SubmissionService::new(Arc::clone(&store), Arc::clone(&queue), &config.upload_dir);

        Ok(Self {
            config,
            store,
            queue,
            submission,
        })
    }
}
