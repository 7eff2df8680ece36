use rust_decimal::Decimal;
use serde::Serialize;

use crate::events::PublishError;
use crate::store::StoreError;

/// Coarse classification collaborators map onto user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    PreconditionFailed,
    IllegalTransition,
    Internal,
}

/// Input that breaks a declared constraint (range, format, required field).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("{field} must be between {min} and {max} (found {found})")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        found: String,
    },
    #[error("{field} has an invalid format: {value:?}")]
    InvalidFormat { field: &'static str, value: String },
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("amount {requested} exceeds outstanding balance {balance}")]
    AmountExceedsBalance { requested: Decimal, balance: Decimal },
    #[error("{start_field} must not be after {end_field}")]
    DateOrder {
        start_field: &'static str,
        end_field: &'static str,
    },
    #[error("repeat and audit enrollments are mutually exclusive")]
    RepeatAndAudit,
    #[error("grade letter {0} is derived from marks and cannot be set as an override")]
    DerivedLetterOverride(&'static str),
    #[error("user must be at least {minimum} years old")]
    Underage { minimum: u32 },
    #[error("{field} must match {expected}")]
    Mismatch {
        field: &'static str,
        expected: String,
    },
}

impl Violation {
    pub fn out_of_range(
        field: &'static str,
        min: impl ToString,
        max: impl ToString,
        found: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            found: found.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Violation::OutOfRange { .. } => "out_of_range",
            Violation::InvalidFormat { .. } => "invalid_format",
            Violation::Required { .. } => "required",
            Violation::Negative { .. } => "negative_value",
            Violation::NonPositiveAmount => "non_positive_amount",
            Violation::AmountExceedsBalance { .. } => "amount_exceeds_balance",
            Violation::DateOrder { .. } => "date_order",
            Violation::RepeatAndAudit => "repeat_and_audit",
            Violation::DerivedLetterOverride(_) => "derived_letter_override",
            Violation::Underage { .. } => "underage",
            Violation::Mismatch { .. } => "mismatch",
        }
    }
}

/// Named unique constraints of the relational layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Conflict {
    #[error("enrollment already exists for this student, course and semester")]
    DuplicateEnrollment,
    #[error("receipt number already used")]
    DuplicateReceipt,
    #[error("code already in use")]
    CodeConflict,
    #[error("student already holds a booking for this academic year")]
    DuplicateBookingForYear,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("national id already registered")]
    DuplicateNationalId,
    #[error("employee number already registered")]
    DuplicateEmployeeNumber,
    #[error("student id already registered")]
    DuplicateStudentNumber,
    #[error("user already has a profile of this kind")]
    ProfileExists,
    #[error("academic year label already exists")]
    DuplicateAcademicYear,
    #[error("semester number already exists in this academic year")]
    DuplicateSemester,
    #[error("student already reported for this semester")]
    DuplicateReporting,
    #[error("fee structure already exists for this programme, academic year, year and semester")]
    DuplicateFeeStructure,
    #[error("room number already exists in this hostel")]
    DuplicateRoom,
    #[error("bed position already provisioned for this room and academic year")]
    DuplicateBed,
    #[error("bed already held by an open booking")]
    BedOccupied,
    #[error("timetable slot already scheduled")]
    DuplicateTimetableSlot,
    #[error("attendance already recorded for this student, slot and date")]
    DuplicateAttendance,
    #[error("call number already catalogued")]
    DuplicateCallNumber,
    #[error("course already placed at this programme year and semester")]
    DuplicateCurriculumEntry,
    #[error("research title already registered for this investigator")]
    DuplicateResearch,
    #[error("an open clearance request of this type already exists")]
    OpenClearanceRequest,
    #[error("an open special exam application already exists for this course and semester")]
    OpenSpecialExamApplication,
    #[error("an open deferment application already exists")]
    OpenDefermentApplication,
}

impl Conflict {
    pub fn code(self) -> &'static str {
        match self {
            Conflict::DuplicateEnrollment => "duplicate_enrollment",
            Conflict::DuplicateReceipt => "duplicate_receipt",
            Conflict::CodeConflict => "code_conflict",
            Conflict::DuplicateBookingForYear => "duplicate_booking_for_year",
            Conflict::DuplicateUsername => "duplicate_username",
            Conflict::DuplicateNationalId => "duplicate_national_id",
            Conflict::DuplicateEmployeeNumber => "duplicate_employee_number",
            Conflict::DuplicateStudentNumber => "duplicate_student_number",
            Conflict::ProfileExists => "profile_exists",
            Conflict::DuplicateAcademicYear => "duplicate_academic_year",
            Conflict::DuplicateSemester => "duplicate_semester",
            Conflict::DuplicateReporting => "duplicate_reporting",
            Conflict::DuplicateFeeStructure => "duplicate_fee_structure",
            Conflict::DuplicateRoom => "duplicate_room",
            Conflict::DuplicateBed => "duplicate_bed",
            Conflict::BedOccupied => "bed_occupied",
            Conflict::DuplicateTimetableSlot => "duplicate_timetable_slot",
            Conflict::DuplicateAttendance => "duplicate_attendance",
            Conflict::DuplicateCallNumber => "duplicate_call_number",
            Conflict::DuplicateCurriculumEntry => "duplicate_curriculum_entry",
            Conflict::DuplicateResearch => "duplicate_research",
            Conflict::OpenClearanceRequest => "open_clearance_request",
            Conflict::OpenSpecialExamApplication => "open_special_exam_application",
            Conflict::OpenDefermentApplication => "open_deferment_application",
        }
    }
}

/// Domain rules that must hold before an operation may proceed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Precondition {
    #[error("prerequisite {course} has no passing grade")]
    PrerequisiteUnmet { course: String },
    #[error("bed {bed} is not available")]
    BedUnavailable { bed: String },
    #[error("registration window for {semester} is closed")]
    RegistrationWindowClosed { semester: String },
    #[error("audit enrollments carry no grade")]
    AuditHasNoGrade,
    #[error("net fee would be negative ({net})")]
    NegativeNetFee { net: Decimal },
    #[error("making {prerequisite} a prerequisite of {course} introduces a cycle")]
    CycleDetected { course: String, prerequisite: String },
    #[error("student {student} is {status}, not active")]
    StudentNotActive { student: String, status: &'static str },
    #[error("{course} is not prescribed for year {year} semester {semester}")]
    NotInCurriculum { course: String, year: u8, semester: u8 },
    #[error("enrollment is no longer active")]
    EnrollmentInactive,
    #[error("expected a {expected} account, found {found}")]
    CategoryMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("fee structure does not belong to the student's programme")]
    FeeStructureMismatch,
    #[error("bed belongs to a different academic year")]
    BedYearMismatch,
    #[error("no copies of {call_number} are available")]
    NoCopiesAvailable { call_number: String },
    #[error("student is not enrolled in {course} for this semester")]
    NotEnrolled { course: String },
    #[error("grades are still outstanding for the academic year")]
    YearIncomplete,
    #[error("{holder} sits at year {year} semester {semester}, outside the new programme structure")]
    ProgrammeStructureInUse {
        holder: String,
        year: u8,
        semester: u8,
    },
    #[error("clearance blocked by {outstanding}")]
    ClearanceOutstanding { outstanding: String },
    #[error("application fee has not been paid")]
    ApplicationFeeUnpaid,
    #[error("no failing grade in {course} to retake")]
    NothingToRetake { course: String },
    #[error("refund of {requested} exceeds the refundable {available}")]
    RefundExceedsPayment {
        requested: Decimal,
        available: Decimal,
    },
}

impl Precondition {
    pub fn code(&self) -> &'static str {
        match self {
            Precondition::PrerequisiteUnmet { .. } => "prerequisite_unmet",
            Precondition::BedUnavailable { .. } => "bed_unavailable",
            Precondition::RegistrationWindowClosed { .. } => "registration_window_closed",
            Precondition::AuditHasNoGrade => "audit_has_no_grade",
            Precondition::NegativeNetFee { .. } => "negative_net_fee",
            Precondition::CycleDetected { .. } => "cycle_detected",
            Precondition::StudentNotActive { .. } => "student_not_active",
            Precondition::NotInCurriculum { .. } => "not_in_curriculum",
            Precondition::EnrollmentInactive => "enrollment_inactive",
            Precondition::CategoryMismatch { .. } => "category_mismatch",
            Precondition::FeeStructureMismatch => "fee_structure_mismatch",
            Precondition::BedYearMismatch => "bed_year_mismatch",
            Precondition::NoCopiesAvailable { .. } => "no_copies_available",
            Precondition::NotEnrolled { .. } => "not_enrolled",
            Precondition::YearIncomplete => "year_incomplete",
            Precondition::RefundExceedsPayment { .. } => "refund_exceeds_payment",
            Precondition::ProgrammeStructureInUse { .. } => "programme_structure_in_use",
            Precondition::ClearanceOutstanding { .. } => "clearance_outstanding",
            Precondition::ApplicationFeeUnpaid => "application_fee_unpaid",
            Precondition::NothingToRetake { .. } => "nothing_to_retake",
        }
    }
}

/// Failure surfaced by every core operation.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("validation failed: {0}")]
    Validation(#[from] Violation),
    #[error("{conflict} ({key})")]
    Conflict { conflict: Conflict, key: String },
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} {key} is inactive")]
    Inactive { entity: &'static str, key: String },
    #[error("precondition failed: {0}")]
    Precondition(#[from] Precondition),
    #[error("{machine} cannot move from {from} to {to}")]
    IllegalTransition {
        machine: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("store failure: {0}")]
    Internal(#[source] StoreError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl RecordsError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn inactive(entity: &'static str, key: impl ToString) -> Self {
        Self::Inactive {
            entity,
            key: key.to_string(),
        }
    }

    pub fn transition(machine: &'static str, from: &'static str, to: &'static str) -> Self {
        Self::IllegalTransition { machine, from, to }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordsError::Validation(_) => ErrorKind::Validation,
            RecordsError::Conflict { .. } => ErrorKind::Conflict,
            RecordsError::NotFound { .. } | RecordsError::Inactive { .. } => ErrorKind::NotFound,
            RecordsError::Precondition(_) => ErrorKind::PreconditionFailed,
            RecordsError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            RecordsError::Internal(_) | RecordsError::Publish(_) => ErrorKind::Internal,
        }
    }

    /// Stable name of the violated constraint or rule.
    pub fn code(&self) -> &'static str {
        match self {
            RecordsError::Validation(violation) => violation.code(),
            RecordsError::Conflict { conflict, .. } => conflict.code(),
            RecordsError::NotFound { .. } => "not_found",
            RecordsError::Inactive { .. } => "inactive",
            RecordsError::Precondition(precondition) => precondition.code(),
            RecordsError::IllegalTransition { .. } => "illegal_transition",
            RecordsError::Internal(_) => "store_failure",
            RecordsError::Publish(_) => "event_publish_failure",
        }
    }
}

impl From<StoreError> for RecordsError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation { conflict, key } => Self::Conflict { conflict, key },
            StoreError::RowMissing { entity, key } => Self::NotFound { entity, key },
            other => Self::Internal(other),
        }
    }
}
