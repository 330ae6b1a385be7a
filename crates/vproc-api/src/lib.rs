//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video submission (persist record + publish processing message)
//! - Status/progress polling, cancellation, listing, deletion
//! - Health/readiness probes and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::SubmissionService;
pub use state::AppState;
