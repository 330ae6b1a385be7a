//! Video processing worker.
//!
//! This crate provides:
//! - A bounded consumer pool over the job queue (prefetch 1 per consumer)
//! - The per-job pipeline state machine
//! - The dead letter queue handler
//! - Graceful shutdown

pub mod config;
pub mod dlq;
pub mod error;
pub mod executor;
pub mod pipeline;

pub use config::WorkerConfig;
pub use dlq::{DlqHandler, DLQ_FAILURE_MESSAGE};
pub use error::{WorkerError, WorkerResult};
pub use executor::WorkerPool;
pub use pipeline::{FfmpegStages, OutputPaths, PipelineContext, PipelineOutcome, StageRunner};
