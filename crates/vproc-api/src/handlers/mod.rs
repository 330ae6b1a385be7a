//! API handlers.

pub mod health;
pub mod videos;

pub use health::{health, ready};
