//! Academic years, semesters and the single "current" designation.

pub mod domain;
mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    parse_label, AcademicYear, NewAcademicYear, NewSemester, SeedReport, Semester,
    REGISTRATION_MARGIN_DAYS, SEEDED_SEMESTER_DAYS, SEEDED_SEMESTER_GAP_DAYS,
};
pub use service::CalendarService;
pub(crate) use service::semester_position;
