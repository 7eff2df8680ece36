use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::grading::Grade;
use crate::ids::{CourseId, EnrollmentId, LecturerId, ProgrammeId, SemesterId, StudentId};
use crate::records_error::Conflict;
use crate::store::{Constrained, UniqueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: StudentId,
    pub course: CourseId,
    pub semester: SemesterId,
    pub lecturer: Option<LecturerId>,
    pub enrolled_on: NaiveDate,
    pub is_active: bool,
    pub is_repeat: bool,
    pub is_audit: bool,
    pub grade: Option<Grade>,
}

impl Enrollment {
    pub fn passed(&self) -> bool {
        self.grade.as_ref().is_some_and(|grade| grade.is_passed)
    }
}

impl Constrained for Enrollment {
    const ENTITY: &'static str = "enrollment";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateEnrollment,
            format!("{}:{}:{}", self.student, self.course, self.semester),
        )]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentFlags {
    /// Retaking a course; any curriculum year of the programme qualifies.
    #[serde(default)]
    pub repeat: bool,
    /// Sitting in without a grade; skips the curriculum placement check.
    #[serde(default)]
    pub audit: bool,
    #[serde(default)]
    pub override_prereq: bool,
    /// Administrative entry outside the registration window.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub student: StudentId,
    pub course: CourseId,
    pub semester: SemesterId,
    #[serde(default)]
    pub lecturer: Option<LecturerId>,
    #[serde(default)]
    pub flags: EnrollmentFlags,
}

/// Whether a cohort enrollment keeps successful rows when others fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    #[default]
    PerRow,
    Transactional,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CohortRequest {
    pub programme: ProgrammeId,
    pub year: u8,
    pub semester: SemesterId,
    #[serde(default)]
    pub flags: EnrollmentFlags,
    #[serde(default)]
    pub mode: BulkMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub student: StudentId,
    pub course: CourseId,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CohortReport {
    pub enrolled: Vec<EnrollmentId>,
    pub failures: Vec<RowFailure>,
}
