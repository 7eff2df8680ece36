//! Semester reporting: students declare presence, registry staff decide.

pub mod domain;
mod service;

pub use domain::{
    ReportingBatchReport, ReportingRequest, ReportingStatus, ReportingType, StudentReporting,
};
pub use service::ReportingService;
