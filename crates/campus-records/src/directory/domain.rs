use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{
    CourseId, DepartmentId, FacultyId, LecturerId, ProgrammeCourseId, ProgrammeId, StaffId,
    StudentId, UserId,
};
use crate::records_error::{Conflict, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, required};

pub const MINIMUM_USER_AGE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCategory {
    Admin,
    Student,
    Lecturer,
    Professor,
    Staff,
    Registrar,
    Dean,
    Hod,
    HostelWarden,
}

impl UserCategory {
    pub fn label(self) -> &'static str {
        match self {
            UserCategory::Admin => "admin",
            UserCategory::Student => "student",
            UserCategory::Lecturer => "lecturer",
            UserCategory::Professor => "professor",
            UserCategory::Staff => "staff",
            UserCategory::Registrar => "registrar",
            UserCategory::Dean => "dean",
            UserCategory::Hod => "hod",
            UserCategory::HostelWarden => "hostel_warden",
        }
    }

    pub fn teaches(self) -> bool {
        matches!(
            self,
            UserCategory::Lecturer | UserCategory::Professor | UserCategory::Dean | UserCategory::Hod
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub national_id: Option<String>,
    pub category: UserCategory,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
}

impl NewUser {
    /// Usernames allow letters, digits and `@ . + - _ /` up to 150 characters.
    pub fn validate(&self, today: NaiveDate) -> Result<(), Violation> {
        required("username", &self.username)?;
        let valid_charset = self
            .username
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '@' | '+' | '-' | '/'));
        if !valid_charset || self.username.chars().count() > 150 {
            return Err(Violation::InvalidFormat {
                field: "username",
                value: self.username.clone(),
            });
        }
        required("first_name", &self.first_name)?;
        required("last_name", &self.last_name)?;
        if let Some(national_id) = &self.national_id {
            required("national_id", national_id)?;
        }
        if let Some(born) = self.date_of_birth {
            if age_on(born, today) < MINIMUM_USER_AGE {
                return Err(Violation::Underage {
                    minimum: MINIMUM_USER_AGE,
                });
            }
        }
        Ok(())
    }
}

/// Completed years between `born` and `today`.
pub fn age_on(born: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub national_id: Option<String>,
    pub category: UserCategory,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn from_new(id: UserId, new: NewUser, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            username: new.username,
            national_id: new.national_id,
            category: new.category,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            gender: new.gender,
            date_of_birth: new.date_of_birth,
            is_active: true,
            created_at,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Constrained for User {
    const ENTITY: &'static str = "user";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new(Conflict::DuplicateUsername, &self.username)];
        if let Some(national_id) = &self.national_id {
            keys.push(UniqueKey::new(Conflict::DuplicateNationalId, national_id));
        }
        keys
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFaculty {
    pub name: String,
    pub code: String,
    pub description: String,
    pub dean: Option<UserId>,
    pub established_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
    pub code: String,
    pub description: String,
    pub dean: Option<UserId>,
    pub established_date: NaiveDate,
    pub is_active: bool,
}

impl Constrained for Faculty {
    const ENTITY: &'static str = "faculty";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(Conflict::CodeConflict, format!("faculty:{}", self.code))]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub code: String,
    pub faculty: FacultyId,
    pub head: Option<UserId>,
    pub description: String,
    pub established_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub code: String,
    pub faculty: FacultyId,
    pub head: Option<UserId>,
    pub description: String,
    pub established_date: NaiveDate,
    pub is_active: bool,
}

impl Constrained for Department {
    const ENTITY: &'static str = "department";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::CodeConflict,
            format!("department:{}", self.code),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgrammeType {
    Bachelor,
    Master,
    Phd,
    Diploma,
    Certificate,
    PostgraduateDiploma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    FullTime,
    PartTime,
    DistanceLearning,
    Online,
    Evening,
    Weekend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgramme {
    pub name: String,
    pub code: String,
    pub programme_type: ProgrammeType,
    pub study_mode: StudyMode,
    pub department: DepartmentId,
    pub duration_years: u8,
    pub semesters_per_year: u8,
    pub total_semesters: u8,
    pub credit_hours_required: u16,
    pub entry_requirements: String,
}

impl NewProgramme {
    pub fn validate(&self) -> Result<(), Violation> {
        required("name", &self.name)?;
        in_range("duration_years", self.duration_years, 1, 8)?;
        in_range("semesters_per_year", self.semesters_per_year, 2, 3)?;
        in_range("total_semesters", self.total_semesters, 2, 24)?;
        in_range("credit_hours_required", self.credit_hours_required, 60, 300)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Programme {
    pub id: ProgrammeId,
    pub name: String,
    pub code: String,
    pub programme_type: ProgrammeType,
    pub study_mode: StudyMode,
    pub department: DepartmentId,
    /// Cached from the owning department; refreshed whenever the department moves.
    pub faculty: FacultyId,
    pub duration_years: u8,
    pub semesters_per_year: u8,
    pub total_semesters: u8,
    pub credit_hours_required: u16,
    pub entry_requirements: String,
    pub is_active: bool,
}

impl Constrained for Programme {
    const ENTITY: &'static str = "programme";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::CodeConflict,
            format!("programme:{}", self.code),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    Core,
    Elective,
    Major,
    Minor,
    GeneralEducation,
    Capstone,
    Thesis,
    Practicum,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CourseLevel {
    #[serde(rename = "100")]
    L100,
    #[serde(rename = "200")]
    L200,
    #[serde(rename = "300")]
    L300,
    #[serde(rename = "400")]
    L400,
    #[serde(rename = "500")]
    L500,
    #[serde(rename = "600")]
    L600,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactHours {
    pub lecture: u16,
    pub tutorial: u16,
    pub practical: u16,
    pub field_work: u16,
}

impl ContactHours {
    pub fn total(&self) -> u16 {
        self.lecture + self.tutorial + self.practical + self.field_work
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub course_type: CourseType,
    pub level: CourseLevel,
    pub credit_hours: u8,
    #[serde(default)]
    pub contact_hours: ContactHours,
    pub department: DepartmentId,
    #[serde(default)]
    pub description: String,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), Violation> {
        required("name", &self.name)?;
        in_range("credit_hours", self.credit_hours, 1, 15)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub code: String,
    pub course_type: CourseType,
    pub level: CourseLevel,
    pub credit_hours: u8,
    pub contact_hours: ContactHours,
    pub department: DepartmentId,
    pub description: String,
    /// Direct prerequisites; the transitive closure is computed on demand.
    pub prerequisites: BTreeSet<CourseId>,
    pub is_active: bool,
}

impl Constrained for Course {
    const ENTITY: &'static str = "course";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(Conflict::CodeConflict, format!("course:{}", self.code))]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumSlot {
    pub programme: ProgrammeId,
    pub course: CourseId,
    pub year: u8,
    pub semester: u8,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeCourse {
    pub id: ProgrammeCourseId,
    pub programme: ProgrammeId,
    pub course: CourseId,
    pub year: u8,
    pub semester: u8,
    pub is_mandatory: bool,
    pub is_active: bool,
}

impl ProgrammeCourse {
    pub fn matches(&self, programme: ProgrammeId, course: CourseId, year: u8, semester: u8) -> bool {
        self.programme == programme
            && self.course == course
            && self.year == year
            && self.semester == semester
    }
}

impl Constrained for ProgrammeCourse {
    const ENTITY: &'static str = "programme_course";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateCurriculumEntry,
            format!(
                "{}:{}:{}:{}",
                self.programme, self.course, self.year, self.semester
            ),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicRank {
    Professor,
    AssociateProfessor,
    SeniorLecturer,
    Lecturer,
    AssistantLecturer,
    TutorialFellow,
    GraduateAssistant,
    VisitingLecturer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Permanent,
    Contract,
    PartTime,
    Visiting,
    Adjunct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLecturer {
    pub user: UserId,
    pub employee_number: String,
    pub department: DepartmentId,
    pub rank: AcademicRank,
    pub employment_type: EmploymentType,
    pub highest_qualification: String,
    pub joining_date: NaiveDate,
    pub contract_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecturer {
    pub id: LecturerId,
    pub user: UserId,
    pub employee_number: String,
    pub department: DepartmentId,
    pub rank: AcademicRank,
    pub employment_type: EmploymentType,
    pub highest_qualification: String,
    pub joining_date: NaiveDate,
    pub contract_end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Constrained for Lecturer {
    const ENTITY: &'static str = "lecturer";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new(Conflict::ProfileExists, format!("lecturer:{}", self.user)),
            UniqueKey::new(Conflict::DuplicateEmployeeNumber, &self.employee_number),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Deferred,
    Suspended,
    Discontinued,
    Expelled,
    OnLeave,
}

impl StudentStatus {
    pub fn label(self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Graduated => "graduated",
            StudentStatus::Deferred => "deferred",
            StudentStatus::Suspended => "suspended",
            StudentStatus::Discontinued => "discontinued",
            StudentStatus::Expelled => "expelled",
            StudentStatus::OnLeave => "on_leave",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionType {
    Direct,
    Mature,
    Transfer,
    International,
    Exchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorType {
    Government,
    #[serde(rename = "self")]
    SelfSponsored,
    Employer,
    Scholarship,
    Bursary,
    Loan,
}

impl SponsorType {
    /// Sponsors whose students are not held back by fee clearance at promotion time.
    pub fn exempt_from_fee_clearance(self) -> bool {
        matches!(
            self,
            SponsorType::Scholarship | SponsorType::Bursary | SponsorType::Government
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub user: UserId,
    pub student_number: String,
    pub programme: ProgrammeId,
    pub current_year: u8,
    pub current_semester: u8,
    pub admission_date: NaiveDate,
    pub admission_type: AdmissionType,
    pub sponsor: SponsorType,
    #[serde(default)]
    pub guardian: GuardianContact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub user: UserId,
    pub student_number: String,
    pub programme: ProgrammeId,
    pub current_year: u8,
    pub current_semester: u8,
    pub admission_date: NaiveDate,
    pub admission_type: AdmissionType,
    pub sponsor: SponsorType,
    pub status: StudentStatus,
    pub cumulative_gpa: Option<Decimal>,
    pub total_credit_hours: u32,
    pub guardian: GuardianContact,
}

impl Student {
    /// Last four characters of the student number, used in receipt numbers.
    pub fn number_suffix(&self) -> String {
        let chars: Vec<char> = self.student_number.chars().collect();
        let start = chars.len().saturating_sub(4);
        chars[start..].iter().collect()
    }
}

impl Constrained for Student {
    const ENTITY: &'static str = "student";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new(Conflict::ProfileExists, format!("student:{}", self.user)),
            UniqueKey::new(Conflict::DuplicateStudentNumber, &self.student_number),
        ]
    }
}

/// Year and semester must fit the programme's structure.
pub fn validate_standing(programme: &Programme, year: u8, semester: u8) -> Result<(), Violation> {
    in_range("current_year", year, 1, programme.duration_years)?;
    in_range("current_semester", semester, 1, programme.semesters_per_year)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffCategory {
    Administrative,
    Technical,
    Library,
    Laboratory,
    ItSupport,
    Maintenance,
    Security,
    Catering,
    Transport,
    Medical,
    Counselling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStaffMember {
    pub user: UserId,
    pub employee_number: String,
    pub category: StaffCategory,
    pub department: Option<DepartmentId>,
    pub designation: String,
    pub joining_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub user: UserId,
    pub employee_number: String,
    pub category: StaffCategory,
    pub department: Option<DepartmentId>,
    pub designation: String,
    pub joining_date: NaiveDate,
    pub is_active: bool,
}

impl Constrained for StaffMember {
    const ENTITY: &'static str = "staff";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new(Conflict::ProfileExists, format!("staff:{}", self.user)),
            UniqueKey::new(Conflict::DuplicateEmployeeNumber, &self.employee_number),
        ]
    }
}

/// Row returned by the programme student listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentListing {
    pub student: StudentId,
    pub student_number: String,
    pub name: String,
    pub current_year: u8,
    pub current_semester: u8,
    pub status: StudentStatus,
    pub cumulative_gpa: Option<Decimal>,
}
