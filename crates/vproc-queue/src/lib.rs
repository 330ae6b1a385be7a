//! Redis Streams job queue with dead-letter topology.
//!
//! This crate provides:
//! - Idempotent topology declaration (main stream + DLQ, consumer groups)
//! - Publishing with priority and per-message TTL
//! - Prefetch-1 consumption with manual acknowledgment
//! - Reject-without-requeue routing to the dead letter queue

pub mod error;
pub mod message;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use message::{ProcessingMessage, FULL_PROCESSING};
pub use queue::{Delivery, DlqDelivery, JobQueue, QueueConfig};
