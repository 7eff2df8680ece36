use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{
    AttendanceId, CourseId, DepartmentId, ExaminationId, LecturerId, ProgrammeId, ResearchId,
    SemesterId, StudentId, TimetableId, UserId,
};
use crate::records_error::{Conflict, RecordsError, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, non_negative, ordered, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    Cat,
    MidSemester,
    Final,
    Supplementary,
    Special,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExamination {
    pub course: CourseId,
    pub semester: SemesterId,
    pub exam_type: ExamType,
    pub exam_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
    pub venue: String,
    #[serde(default = "default_max_marks")]
    pub max_marks: u16,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub invigilators: Vec<LecturerId>,
}

fn default_max_marks() -> u16 {
    100
}

impl NewExamination {
    pub fn validate(&self) -> Result<(), Violation> {
        in_range("duration_minutes", self.duration_minutes, 1, 720)?;
        in_range("max_marks", self.max_marks, 1, 1000)?;
        required("venue", &self.venue)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Examination {
    pub id: ExaminationId,
    pub course: CourseId,
    pub semester: SemesterId,
    pub exam_type: ExamType,
    pub exam_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u16,
    pub venue: String,
    pub max_marks: u16,
    pub instructions: String,
    pub invigilators: Vec<LecturerId>,
    pub is_published: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Examination {
    /// Wall-clock end; wraps past midnight.
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }
}

impl Constrained for Examination {
    const ENTITY: &'static str = "examination";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn label(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    #[default]
    Lecture,
    Tutorial,
    Practical,
    Seminar,
    Fieldwork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTimetableSlot {
    pub course: CourseId,
    pub lecturer: LecturerId,
    pub semester: SemesterId,
    pub programme: ProgrammeId,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue: String,
    #[serde(default)]
    pub class_type: ClassType,
    pub year: u8,
    pub semester_number: u8,
}

impl NewTimetableSlot {
    pub fn validate(&self) -> Result<(), Violation> {
        if self.start_time >= self.end_time {
            return Err(Violation::DateOrder {
                start_field: "start_time",
                end_field: "end_time",
            });
        }
        required("venue", &self.venue)?;
        in_range("year", self.year, 1, 8)?;
        in_range("semester_number", self.semester_number, 1, 3)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub id: TimetableId,
    pub course: CourseId,
    pub lecturer: LecturerId,
    pub semester: SemesterId,
    pub programme: ProgrammeId,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue: String,
    pub class_type: ClassType,
    pub year: u8,
    pub semester_number: u8,
    pub is_active: bool,
}

impl Constrained for TimetableSlot {
    const ENTITY: &'static str = "timetable slot";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateTimetableSlot,
            format!(
                "{}:{}:{}:{}:{}",
                self.course,
                self.lecturer,
                self.semester,
                self.day.label(),
                self.start_time.format("%H:%M")
            ),
        )]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttendance {
    pub student: StudentId,
    pub slot: TimetableId,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub student: StudentId,
    pub slot: TimetableId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub marked_by: UserId,
    pub marked_at: DateTime<Utc>,
}

impl Constrained for AttendanceRecord {
    const ENTITY: &'static str = "attendance record";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateAttendance,
            format!("{}:{}:{}", self.student, self.slot, self.date),
        )]
    }
}

/// Attendance tallies for one student in one course and semester. Late arrivals
/// count as attended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
}

impl AttendanceSummary {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.excused
    }

    /// Attended sessions as a percentage of all sessions, two decimals.
    pub fn rate(&self) -> Decimal {
        let total = self.total();
        if total == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.present + self.late) * Decimal::ONE_HUNDRED / Decimal::from(total))
            .round_dp(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchType {
    Undergraduate,
    Masters,
    Phd,
    Faculty,
    Collaborative,
    Funded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Proposal,
    Ongoing,
    Completed,
    Published,
    Suspended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchAction {
    Start,
    Complete,
    Publish,
    Suspend,
    Resume,
    Cancel,
}

impl ResearchStatus {
    pub fn label(self) -> &'static str {
        match self {
            ResearchStatus::Proposal => "proposal",
            ResearchStatus::Ongoing => "ongoing",
            ResearchStatus::Completed => "completed",
            ResearchStatus::Published => "published",
            ResearchStatus::Suspended => "suspended",
            ResearchStatus::Cancelled => "cancelled",
        }
    }

    pub fn apply(self, action: ResearchAction) -> Result<ResearchStatus, RecordsError> {
        use ResearchAction as A;
        use ResearchStatus as S;

        let next = match (self, action) {
            (S::Proposal, A::Start) => S::Ongoing,
            (S::Ongoing, A::Complete) => S::Completed,
            (S::Completed, A::Publish) => S::Published,
            (S::Proposal | S::Ongoing, A::Suspend) => S::Suspended,
            (S::Suspended, A::Resume) => S::Ongoing,
            (S::Proposal | S::Ongoing | S::Suspended, A::Cancel) => S::Cancelled,
            (from, action) => {
                return Err(RecordsError::transition(
                    "research project",
                    from.label(),
                    action.target().label(),
                ))
            }
        };
        Ok(next)
    }
}

impl ResearchAction {
    pub fn target(self) -> ResearchStatus {
        match self {
            ResearchAction::Start | ResearchAction::Resume => ResearchStatus::Ongoing,
            ResearchAction::Complete => ResearchStatus::Completed,
            ResearchAction::Publish => ResearchStatus::Published,
            ResearchAction::Suspend => ResearchStatus::Suspended,
            ResearchAction::Cancel => ResearchStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResearch {
    pub title: String,
    pub research_type: ResearchType,
    pub principal_investigator: LecturerId,
    #[serde(default)]
    pub co_investigators: Vec<LecturerId>,
    #[serde(default)]
    pub students: Vec<StudentId>,
    pub department: DepartmentId,
    pub start_date: NaiveDate,
    pub expected_end_date: NaiveDate,
    #[serde(rename = "abstract")]
    pub summary: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub funding_amount: Option<Decimal>,
    #[serde(default)]
    pub funding_source: String,
    #[serde(default)]
    pub ethics_approval: bool,
}

impl NewResearch {
    pub fn validate(&self) -> Result<(), Violation> {
        required("title", &self.title)?;
        required("abstract", &self.summary)?;
        ordered(
            "start_date",
            self.start_date,
            "expected_end_date",
            self.expected_end_date,
        )?;
        if let Some(amount) = self.funding_amount {
            non_negative("funding_amount", amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchProject {
    pub id: ResearchId,
    pub title: String,
    pub research_type: ResearchType,
    pub principal_investigator: LecturerId,
    pub co_investigators: Vec<LecturerId>,
    pub students: Vec<StudentId>,
    pub department: DepartmentId,
    pub start_date: NaiveDate,
    pub expected_end_date: NaiveDate,
    pub actual_end_date: Option<NaiveDate>,
    pub status: ResearchStatus,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub keywords: String,
    pub funding_amount: Option<Decimal>,
    pub funding_source: String,
    pub ethics_approval: bool,
    pub created_at: DateTime<Utc>,
}

impl Constrained for ResearchProject {
    const ENTITY: &'static str = "research project";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateResearch,
            format!(
                "{}:{}",
                self.principal_investigator,
                self.title.trim().to_lowercase()
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn examination_end_time_adds_the_duration() {
        let exam = Examination {
            id: ExaminationId(1),
            course: CourseId(1),
            semester: SemesterId(1),
            exam_type: ExamType::Final,
            exam_date: NaiveDate::from_ymd_opt(2024, 12, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 150,
            venue: "Hall A".to_string(),
            max_marks: 100,
            instructions: String::new(),
            invigilators: Vec::new(),
            is_published: false,
            created_by: UserId(1),
            created_at: Utc::now(),
        };
        assert_eq!(exam.end_time(), NaiveTime::from_hms_opt(11, 30, 0).unwrap());
    }

    #[test]
    fn research_moves_through_its_lifecycle() {
        let ongoing = ResearchStatus::Proposal
            .apply(ResearchAction::Start)
            .expect("start");
        let suspended = ongoing.apply(ResearchAction::Suspend).expect("suspend");
        let resumed = suspended.apply(ResearchAction::Resume).expect("resume");
        let completed = resumed.apply(ResearchAction::Complete).expect("complete");
        assert_eq!(
            completed.apply(ResearchAction::Publish).expect("publish"),
            ResearchStatus::Published
        );
        assert!(completed.apply(ResearchAction::Cancel).is_err());
        assert!(ResearchStatus::Cancelled.apply(ResearchAction::Resume).is_err());
    }

    #[test]
    fn attendance_rate_counts_late_as_attended() {
        let mut summary = AttendanceSummary::default();
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::Absent,
        ] {
            summary.record(status);
        }
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.rate(), dec!(66.67));
    }

    #[test]
    fn slots_must_end_after_they_start() {
        let slot = NewTimetableSlot {
            course: CourseId(1),
            lecturer: LecturerId(1),
            semester: SemesterId(1),
            programme: ProgrammeId(1),
            day: DayOfWeek::Monday,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            venue: "LT1".to_string(),
            class_type: ClassType::Lecture,
            year: 1,
            semester_number: 1,
        };
        assert!(matches!(slot.validate(), Err(Violation::DateOrder { .. })));
    }
}
