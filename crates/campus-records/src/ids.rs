use serde::{Deserialize, Serialize};
use std::fmt;

/// Row identifiers are allocated by the store; each table has its own sequence.
pub trait RowId: Copy + Ord + fmt::Debug {
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

macro_rules! row_ids {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl RowId for $name {
                fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                fn raw(self) -> u64 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

row_ids!(
    UserId,
    FacultyId,
    DepartmentId,
    ProgrammeId,
    CourseId,
    ProgrammeCourseId,
    LecturerId,
    StudentId,
    StaffId,
    AcademicYearId,
    SemesterId,
    ReportingId,
    EnrollmentId,
    FeeStructureId,
    FeePaymentId,
    HostelId,
    RoomId,
    BedId,
    BookingId,
    HostelPaymentId,
    ExaminationId,
    TimetableId,
    AttendanceId,
    NotificationId,
    LibraryResourceId,
    LoanId,
    ResearchId,
    TwoFactorCodeId,
    LoginAttemptId,
    ClearanceId,
    SpecialExamId,
    DefermentId,
);

/// The user performing a mutating operation, recorded for audit attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor(pub UserId);

impl Actor {
    pub fn user(self) -> UserId {
        self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}
