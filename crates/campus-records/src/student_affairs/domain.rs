use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ClearanceId, CourseId, DefermentId, SemesterId, SpecialExamId, StudentId, UserId};
use crate::records_error::{Conflict, RecordsError, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, non_negative, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceType {
    Library,
    Finance,
    Accommodation,
    Department,
    Registry,
    StudentAffairs,
    Graduation,
    Transfer,
}

/// Which records an office looks at before it signs a clearance off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearanceScope {
    pub fees: bool,
    pub library: bool,
    pub accommodation: bool,
}

impl ClearanceType {
    pub fn label(self) -> &'static str {
        match self {
            ClearanceType::Library => "library",
            ClearanceType::Finance => "finance",
            ClearanceType::Accommodation => "accommodation",
            ClearanceType::Department => "department",
            ClearanceType::Registry => "registry",
            ClearanceType::StudentAffairs => "student_affairs",
            ClearanceType::Graduation => "graduation",
            ClearanceType::Transfer => "transfer",
        }
    }

    pub fn scope(self) -> ClearanceScope {
        match self {
            ClearanceType::Finance => ClearanceScope {
                fees: true,
                ..ClearanceScope::default()
            },
            ClearanceType::Library => ClearanceScope {
                library: true,
                ..ClearanceScope::default()
            },
            ClearanceType::Accommodation => ClearanceScope {
                accommodation: true,
                ..ClearanceScope::default()
            },
            ClearanceType::Graduation | ClearanceType::Transfer => ClearanceScope {
                fees: true,
                library: true,
                accommodation: true,
            },
            ClearanceType::Department | ClearanceType::Registry | ClearanceType::StudentAffairs => {
                ClearanceScope::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceStatus {
    Pending,
    RequiresAction,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceAction {
    Approve,
    Reject,
    RequireAction,
}

impl ClearanceStatus {
    pub fn label(self) -> &'static str {
        match self {
            ClearanceStatus::Pending => "pending",
            ClearanceStatus::RequiresAction => "requires_action",
            ClearanceStatus::Approved => "approved",
            ClearanceStatus::Rejected => "rejected",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, ClearanceStatus::Pending | ClearanceStatus::RequiresAction)
    }

    pub fn apply(self, action: ClearanceAction) -> Result<ClearanceStatus, RecordsError> {
        use ClearanceAction as A;
        use ClearanceStatus as S;

        let next = match (self, action) {
            (S::Pending | S::RequiresAction, A::Approve) => S::Approved,
            (S::Pending | S::RequiresAction, A::Reject) => S::Rejected,
            (S::Pending, A::RequireAction) => S::RequiresAction,
            (from, action) => {
                return Err(RecordsError::transition(
                    "clearance request",
                    from.label(),
                    action.target().label(),
                ))
            }
        };
        Ok(next)
    }
}

impl ClearanceAction {
    pub fn target(self) -> ClearanceStatus {
        match self {
            ClearanceAction::Approve => ClearanceStatus::Approved,
            ClearanceAction::Reject => ClearanceStatus::Rejected,
            ClearanceAction::RequireAction => ClearanceStatus::RequiresAction,
        }
    }
}

/// What still stands between the student and the clearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceAssessment {
    pub outstanding_balance: Decimal,
    pub items_to_return: Vec<String>,
}

impl ClearanceAssessment {
    pub fn is_clear(&self) -> bool {
        self.outstanding_balance <= Decimal::ZERO && self.items_to_return.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.outstanding_balance > Decimal::ZERO {
            parts.push(format!("balance {}", self.outstanding_balance));
        }
        parts.extend(self.items_to_return.iter().cloned());
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearanceRequest {
    pub id: ClearanceId,
    pub student: StudentId,
    pub clearance_type: ClearanceType,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub status: ClearanceStatus,
    pub assessment: ClearanceAssessment,
    #[serde(default)]
    pub additional_requirements: String,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remarks: String,
}

impl Constrained for ClearanceRequest {
    const ENTITY: &'static str = "clearance request";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        if !self.status.is_open() {
            return Vec::new();
        }
        vec![UniqueKey::new(
            Conflict::OpenClearanceRequest,
            format!("{}:{}", self.student, self.clearance_type.label()),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClearanceRequest {
    pub student: StudentId,
    pub clearance_type: ClearanceType,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearanceDecision {
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub additional_requirements: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialExamType {
    MissedExam,
    FailedExam,
    SickExam,
    TechnicalIssue,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialExamStatus {
    Pending,
    Approved,
    Rejected,
    Scheduled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialExamAction {
    Approve,
    Reject,
    Schedule,
    Complete,
}

impl SpecialExamStatus {
    pub fn label(self) -> &'static str {
        match self {
            SpecialExamStatus::Pending => "pending",
            SpecialExamStatus::Approved => "approved",
            SpecialExamStatus::Rejected => "rejected",
            SpecialExamStatus::Scheduled => "scheduled",
            SpecialExamStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SpecialExamStatus::Rejected | SpecialExamStatus::Completed)
    }

    pub fn apply(self, action: SpecialExamAction) -> Result<SpecialExamStatus, RecordsError> {
        use SpecialExamAction as A;
        use SpecialExamStatus as S;

        let next = match (self, action) {
            (S::Pending, A::Approve) => S::Approved,
            (S::Pending, A::Reject) => S::Rejected,
            (S::Approved, A::Schedule) => S::Scheduled,
            (S::Scheduled, A::Complete) => S::Completed,
            (from, action) => {
                return Err(RecordsError::transition(
                    "special exam application",
                    from.label(),
                    action.target().label(),
                ))
            }
        };
        Ok(next)
    }
}

impl SpecialExamAction {
    pub fn target(self) -> SpecialExamStatus {
        match self {
            SpecialExamAction::Approve => SpecialExamStatus::Approved,
            SpecialExamAction::Reject => SpecialExamStatus::Rejected,
            SpecialExamAction::Schedule => SpecialExamStatus::Scheduled,
            SpecialExamAction::Complete => SpecialExamStatus::Completed,
        }
    }
}

/// Sitting arranged for an approved application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSitting {
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub duration_minutes: u16,
}

impl ExamSitting {
    pub fn validate(&self) -> Result<(), Violation> {
        required("venue", &self.venue)?;
        in_range("duration_minutes", self.duration_minutes, 15, 480)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialExamApplication {
    pub id: SpecialExamId,
    pub student: StudentId,
    pub course: CourseId,
    pub semester: SemesterId,
    pub application_type: SpecialExamType,
    pub reason: String,
    pub original_exam_date: NaiveDate,
    pub applied_at: DateTime<Utc>,
    pub status: SpecialExamStatus,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_remarks: String,
    pub sitting: Option<ExamSitting>,
    pub application_fee: Decimal,
    pub fee_paid: bool,
    #[serde(default)]
    pub payment_reference: String,
}

impl SpecialExamApplication {
    pub fn fee_outstanding(&self) -> bool {
        self.application_fee > Decimal::ZERO && !self.fee_paid
    }
}

impl Constrained for SpecialExamApplication {
    const ENTITY: &'static str = "special exam application";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        vec![UniqueKey::new(
            Conflict::OpenSpecialExamApplication,
            format!("{}:{}:{}", self.student, self.course, self.semester),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSpecialExamApplication {
    pub student: StudentId,
    pub course: CourseId,
    pub semester: SemesterId,
    pub application_type: SpecialExamType,
    pub reason: String,
    pub original_exam_date: NaiveDate,
    #[serde(default)]
    pub application_fee: Decimal,
}

impl NewSpecialExamApplication {
    pub fn validate(&self) -> Result<(), Violation> {
        required("reason", &self.reason)?;
        non_negative("application_fee", self.application_fee)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefermentType {
    Medical,
    Financial,
    Family,
    Work,
    Personal,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefermentStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl DefermentStatus {
    pub fn label(self) -> &'static str {
        match self {
            DefermentStatus::Pending => "pending",
            DefermentStatus::UnderReview => "under_review",
            DefermentStatus::Approved => "approved",
            DefermentStatus::Rejected => "rejected",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, DefermentStatus::Pending | DefermentStatus::UnderReview)
    }

    pub fn review(self) -> Result<DefermentStatus, RecordsError> {
        match self {
            DefermentStatus::Pending => Ok(DefermentStatus::UnderReview),
            from => Err(RecordsError::transition(
                "deferment application",
                from.label(),
                DefermentStatus::UnderReview.label(),
            )),
        }
    }

    pub fn decide(self, approve: bool) -> Result<DefermentStatus, RecordsError> {
        let target = if approve {
            DefermentStatus::Approved
        } else {
            DefermentStatus::Rejected
        };
        if self.is_open() {
            Ok(target)
        } else {
            Err(RecordsError::transition(
                "deferment application",
                self.label(),
                target.label(),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefermentApplication {
    pub id: DefermentId,
    pub student: StudentId,
    pub deferment_type: DefermentType,
    pub reason: String,
    pub requested_start_date: NaiveDate,
    pub requested_duration_months: u8,
    pub applied_at: DateTime<Utc>,
    pub status: DefermentStatus,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_remarks: String,
    pub approved_start_date: Option<NaiveDate>,
    pub approved_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub conditions: String,
}

impl Constrained for DefermentApplication {
    const ENTITY: &'static str = "deferment application";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        if !self.status.is_open() {
            return Vec::new();
        }
        vec![UniqueKey::new(
            Conflict::OpenDefermentApplication,
            self.student.to_string(),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDefermentApplication {
    pub student: StudentId,
    pub deferment_type: DefermentType,
    pub reason: String,
    pub requested_start_date: NaiveDate,
    pub requested_duration_months: u8,
}

impl NewDefermentApplication {
    pub fn validate(&self) -> Result<(), Violation> {
        required("reason", &self.reason)?;
        in_range(
            "requested_duration_months",
            self.requested_duration_months,
            1,
            24,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefermentDecision {
    /// Approved start; the requested start when absent.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub remarks: String,
}

/// Last day of a deferment of `months` starting on `start`.
pub fn deferment_end(start: NaiveDate, months: u8) -> Option<NaiveDate> {
    start
        .checked_add_months(Months::new(u32::from(months)))?
        .pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn clearances_close_on_a_decision_and_only_pending_can_ask_for_action() {
        let status = ClearanceStatus::Pending
            .apply(ClearanceAction::RequireAction)
            .expect("ask for action");
        assert_eq!(status, ClearanceStatus::RequiresAction);
        assert_eq!(
            status.apply(ClearanceAction::Approve).expect("approve"),
            ClearanceStatus::Approved
        );
        assert!(matches!(
            status.apply(ClearanceAction::RequireAction),
            Err(RecordsError::IllegalTransition {
                from: "requires_action",
                to: "requires_action",
                ..
            })
        ));
        assert!(ClearanceStatus::Rejected
            .apply(ClearanceAction::Approve)
            .is_err());
    }

    #[test]
    fn graduation_clearance_checks_every_office() {
        assert_eq!(
            ClearanceType::Graduation.scope(),
            ClearanceScope {
                fees: true,
                library: true,
                accommodation: true,
            }
        );
        assert_eq!(ClearanceType::Registry.scope(), ClearanceScope::default());
    }

    #[test]
    fn assessment_lists_the_balance_before_items() {
        let assessment = ClearanceAssessment {
            outstanding_balance: dec!(1500),
            items_to_return: vec!["QA76-A25".to_string()],
        };
        assert!(!assessment.is_clear());
        assert_eq!(assessment.summary(), "balance 1500, QA76-A25");
        assert!(ClearanceAssessment::default().is_clear());
    }

    #[test]
    fn special_exams_move_forward_one_step_at_a_time() {
        let approved = SpecialExamStatus::Pending
            .apply(SpecialExamAction::Approve)
            .expect("approve");
        let scheduled = approved.apply(SpecialExamAction::Schedule).expect("schedule");
        assert_eq!(
            scheduled.apply(SpecialExamAction::Complete).expect("complete"),
            SpecialExamStatus::Completed
        );
        assert!(matches!(
            SpecialExamStatus::Pending.apply(SpecialExamAction::Schedule),
            Err(RecordsError::IllegalTransition {
                from: "pending",
                to: "scheduled",
                ..
            })
        ));
    }

    #[test]
    fn deferments_end_the_day_before_the_anniversary() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).expect("date");
        assert_eq!(deferment_end(start, 12), NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(deferment_end(start, 2), NaiveDate::from_ymd_opt(2025, 3, 5));
    }

    #[test]
    fn deferment_durations_are_bounded() {
        let new = NewDefermentApplication {
            student: StudentId(1),
            deferment_type: DefermentType::Medical,
            reason: "surgery".to_string(),
            requested_start_date: NaiveDate::from_ymd_opt(2025, 1, 6).expect("date"),
            requested_duration_months: 25,
        };
        assert!(matches!(
            new.validate(),
            Err(Violation::OutOfRange {
                field: "requested_duration_months",
                ..
            })
        ));
    }
}
