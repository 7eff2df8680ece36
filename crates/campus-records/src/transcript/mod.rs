//! Read-side roll-ups: semester and cumulative GPA, credit hours and the transcript.

pub mod gpa;
mod service;

pub use gpa::{
    attempts_of, cumulative_gpa, earned_credit_hours, effective_attempts, semester_gpa,
    weighted_gpa, Attempt,
};
pub(crate) use gpa::refresh_student_standing;
pub use service::{Transcript, TranscriptLine, TranscriptSemester, TranscriptService, TranscriptYear};
