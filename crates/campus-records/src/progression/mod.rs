//! End-of-year academic progression.

pub mod domain;
mod service;

pub use domain::{ProgressionOutcome, ProgressionReport, ProgressionRequest};
pub use service::ProgressionService;
