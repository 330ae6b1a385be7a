//! API services.

pub mod submission;

pub use submission::{NewSubmission, SubmissionError, SubmissionService};
