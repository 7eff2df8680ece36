#![allow(dead_code)]

use std::sync::Arc;

use campus_records::calendar::{AcademicYear, NewAcademicYear, NewSemester, Semester};
use campus_records::config::PolicyConfig;
use campus_records::context::FixedClock;
use campus_records::directory::{
    AdmissionType, Course, CourseLevel, CourseType, CurriculumSlot, GuardianContact, NewCourse,
    NewDepartment, NewFaculty, NewProgramme, NewStudent, NewUser, Programme, ProgrammeType,
    SponsorType, Student, StudyMode, UserCategory,
};
use campus_records::enrollment::{Enrollment, EnrollmentFlags, EnrollmentRequest};
use campus_records::events::MemoryEventLog;
use campus_records::grading::GradeEntry;
use campus_records::ids::{Actor, CourseId, SemesterId, UserId};
use campus_records::store::MemoryDatabase;
use campus_records::Campus;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

pub type TestCampus = Campus<MemoryDatabase, MemoryEventLog>;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// A three-year, two-semester programme with C101 and C102 in year 1 semester 1 and
/// C201 (requires C101) in year 1 semester 2. The 2024/2025 year and its first
/// semester are current; the clock reads 2024-09-10, inside the semester 1
/// registration window.
pub struct World {
    pub campus: Arc<TestCampus>,
    pub actor: Actor,
    pub programme: Programme,
    pub intro: Course,
    pub maths: Course,
    pub data: Course,
    pub year: AcademicYear,
    pub first: Semester,
    pub second: Semester,
}

impl World {
    pub fn new() -> Self {
        Self::with_policy(PolicyConfig::default())
    }

    pub fn with_policy(policy: PolicyConfig) -> Self {
        let now = Utc
            .with_ymd_and_hms(2024, 9, 10, 8, 0, 0)
            .single()
            .expect("valid instant");
        let campus = Arc::new(Campus::in_memory_at(Arc::new(FixedClock(now)), policy));

        let registrar = campus
            .directory
            .create_user(Actor(UserId(0)), new_user("registrar", UserCategory::Registrar))
            .expect("registrar created");
        let actor = Actor(registrar.id);

        let faculty = campus
            .directory
            .create_faculty(
                actor,
                NewFaculty {
                    name: "Faculty of Science".to_string(),
                    code: "SCI".to_string(),
                    description: String::new(),
                    dean: None,
                    established_date: date(1990, 1, 1),
                },
            )
            .expect("faculty created");
        let department = campus
            .directory
            .create_department(
                actor,
                NewDepartment {
                    name: "Computing".to_string(),
                    code: "CS".to_string(),
                    faculty: faculty.id,
                    head: None,
                    description: String::new(),
                    established_date: date(1995, 1, 1),
                },
            )
            .expect("department created");
        let programme = campus
            .directory
            .create_programme(
                actor,
                NewProgramme {
                    name: "BSc Computer Science".to_string(),
                    code: "BSC-CS".to_string(),
                    programme_type: ProgrammeType::Bachelor,
                    study_mode: StudyMode::FullTime,
                    department: department.id,
                    duration_years: 3,
                    semesters_per_year: 2,
                    total_semesters: 6,
                    credit_hours_required: 120,
                    entry_requirements: String::new(),
                },
            )
            .expect("programme created");

        let course = |code: &str, name: &str| {
            campus
                .directory
                .create_course(
                    actor,
                    NewCourse {
                        name: name.to_string(),
                        code: code.to_string(),
                        course_type: CourseType::Core,
                        level: CourseLevel::L100,
                        credit_hours: 3,
                        contact_hours: Default::default(),
                        department: department.id,
                        description: String::new(),
                    },
                )
                .expect("course created")
        };
        let intro = course("C101", "Introduction to Programming");
        let maths = course("C102", "Discrete Mathematics");
        let data = course("C201", "Data Structures");
        campus
            .directory
            .add_prerequisite(actor, data.id, intro.id)
            .expect("C101 before C201");

        for (course, semester) in [(intro.id, 1), (maths.id, 1), (data.id, 2)] {
            campus
                .directory
                .upsert_curriculum(
                    actor,
                    CurriculumSlot {
                        programme: programme.id,
                        course,
                        year: 1,
                        semester,
                        is_mandatory: true,
                    },
                )
                .expect("curriculum slot");
        }

        let (year, first, second) = academic_year(&campus, actor, 2024);
        campus
            .calendar
            .set_current_year(actor, year.id)
            .expect("current year");
        campus
            .calendar
            .set_current_semester(actor, first.id)
            .expect("current semester");

        Self {
            campus,
            actor,
            programme,
            intro,
            maths,
            data,
            year,
            first,
            second,
        }
    }

    /// Register an active year 1 semester 1 student; the account username is the
    /// lowercased student number.
    pub fn student(&self, number: &str) -> Student {
        self.student_sponsored(number, SponsorType::SelfSponsored)
    }

    pub fn student_sponsored(&self, number: &str, sponsor: SponsorType) -> Student {
        let account = self
            .campus
            .directory
            .create_user(
                self.actor,
                new_user(&number.to_ascii_lowercase(), UserCategory::Student),
            )
            .expect("student account");
        self.campus
            .directory
            .register_student(
                self.actor,
                NewStudent {
                    user: account.id,
                    student_number: number.to_string(),
                    programme: self.programme.id,
                    current_year: 1,
                    current_semester: 1,
                    admission_date: date(2024, 9, 2),
                    admission_type: AdmissionType::Direct,
                    sponsor,
                    guardian: GuardianContact::default(),
                },
            )
            .expect("student registered")
    }

    pub fn enroll(&self, student: &Student, course: CourseId, semester: SemesterId) -> Enrollment {
        self.campus
            .enrollment
            .enroll(self.actor, request(student, course, semester, EnrollmentFlags::default()))
            .expect("enrollment accepted")
    }

    pub fn grade(&self, enrollment: &Enrollment, cat: Decimal, final_exam: Decimal) {
        self.campus
            .grading
            .record_grade(self.actor, marks(enrollment, cat, final_exam))
            .expect("grade recorded");
    }

    /// Second academic year, for repeat enrollments and promotion into year 2.
    pub fn next_year(&self) -> (AcademicYear, Semester, Semester) {
        academic_year(&self.campus, self.actor, 2025)
    }
}

pub fn request(
    student: &Student,
    course: CourseId,
    semester: SemesterId,
    flags: EnrollmentFlags,
) -> EnrollmentRequest {
    EnrollmentRequest {
        student: student.id,
        course,
        semester,
        lecturer: None,
        flags,
    }
}

pub fn marks(enrollment: &Enrollment, cat: Decimal, final_exam: Decimal) -> GradeEntry {
    GradeEntry {
        enrollment: enrollment.id,
        cat: Some(cat),
        final_exam: Some(final_exam),
        practical: None,
        project: None,
        remarks: None,
        exam_date: None,
    }
}

pub fn new_user(username: &str, category: UserCategory) -> NewUser {
    NewUser {
        username: username.to_string(),
        national_id: None,
        category,
        first_name: "Test".to_string(),
        last_name: username.to_string(),
        email: format!("{username}@campus.test"),
        phone: String::new(),
        gender: None,
        date_of_birth: Some(date(2000, 1, 15)),
    }
}

fn academic_year(
    campus: &TestCampus,
    actor: Actor,
    start_year: i32,
) -> (AcademicYear, Semester, Semester) {
    let year = campus
        .calendar
        .create_academic_year(
            actor,
            NewAcademicYear::standard(start_year).expect("standard year"),
        )
        .expect("academic year created");
    let first = campus
        .calendar
        .create_semester(actor, NewSemester::seeded(year.id, year.start_date, 1))
        .expect("semester 1");
    let second = campus
        .calendar
        .create_semester(actor, NewSemester::seeded(year.id, year.start_date, 2))
        .expect("semester 2");
    (year, first, second)
}
