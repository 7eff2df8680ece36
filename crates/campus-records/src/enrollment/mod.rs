//! Student to course admission for one semester.

pub mod domain;
mod service;

pub use domain::{
    BulkMode, CohortReport, CohortRequest, Enrollment, EnrollmentFlags, EnrollmentRequest,
    RowFailure,
};
pub use service::EnrollmentService;
pub(crate) use service::admit;
