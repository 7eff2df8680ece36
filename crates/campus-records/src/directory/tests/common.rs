use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::campus::Campus;
use crate::config::PolicyConfig;
use crate::context::FixedClock;
use crate::directory::{
    AdmissionType, CourseLevel, CourseType, Department, Faculty, GuardianContact, NewCourse,
    NewDepartment, NewFaculty, NewProgramme, NewStudent, NewUser, Programme, ProgrammeType,
    SponsorType, Student, StudyMode, User, UserCategory,
};
use crate::events::MemoryEventLog;
use crate::ids::{Actor, DepartmentId, FacultyId, ProgrammeId, UserId};
use crate::store::MemoryDatabase;

pub(super) type TestCampus = Campus<MemoryDatabase, MemoryEventLog>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn campus() -> TestCampus {
    let now = Utc
        .with_ymd_and_hms(2024, 9, 10, 8, 0, 0)
        .single()
        .expect("valid instant");
    Campus::in_memory_at(Arc::new(FixedClock(now)), PolicyConfig::default())
}

/// The registrar account every fixture mutation is attributed to.
pub(super) fn registrar(campus: &TestCampus) -> Actor {
    let user = campus
        .directory
        .create_user(Actor(UserId(0)), new_user("registrar", UserCategory::Registrar))
        .expect("registrar created");
    Actor(user.id)
}

pub(super) fn new_user(username: &str, category: UserCategory) -> NewUser {
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

pub(super) fn user(campus: &TestCampus, actor: Actor, username: &str, category: UserCategory) -> User {
    campus
        .directory
        .create_user(actor, new_user(username, category))
        .expect("user created")
}

pub(super) fn faculty(campus: &TestCampus, actor: Actor, code: &str) -> Faculty {
    campus
        .directory
        .create_faculty(
            actor,
            NewFaculty {
                name: format!("Faculty {code}"),
                code: code.to_string(),
                description: String::new(),
                dean: None,
                established_date: date(1990, 1, 1),
            },
        )
        .expect("faculty created")
}

pub(super) fn new_department(faculty: FacultyId, code: &str) -> NewDepartment {
    NewDepartment {
        name: format!("Department {code}"),
        code: code.to_string(),
        faculty,
        head: None,
        description: String::new(),
        established_date: date(1995, 1, 1),
    }
}

pub(super) fn department(
    campus: &TestCampus,
    actor: Actor,
    faculty: FacultyId,
    code: &str,
) -> Department {
    campus
        .directory
        .create_department(actor, new_department(faculty, code))
        .expect("department created")
}

pub(super) fn new_programme(department: DepartmentId, code: &str) -> NewProgramme {
    NewProgramme {
        name: format!("Programme {code}"),
        code: code.to_string(),
        programme_type: ProgrammeType::Bachelor,
        study_mode: StudyMode::FullTime,
        department,
        duration_years: 3,
        semesters_per_year: 2,
        total_semesters: 6,
        credit_hours_required: 120,
        entry_requirements: String::new(),
    }
}

pub(super) fn programme(
    campus: &TestCampus,
    actor: Actor,
    department: DepartmentId,
    code: &str,
) -> Programme {
    campus
        .directory
        .create_programme(actor, new_programme(department, code))
        .expect("programme created")
}

pub(super) fn new_course(department: DepartmentId, code: &str) -> NewCourse {
    NewCourse {
        name: format!("Course {code}"),
        code: code.to_string(),
        course_type: CourseType::Core,
        level: CourseLevel::L100,
        credit_hours: 3,
        contact_hours: Default::default(),
        department,
        description: String::new(),
    }
}

pub(super) fn student(
    campus: &TestCampus,
    actor: Actor,
    programme: ProgrammeId,
    number: &str,
) -> Student {
    let account = user(campus, actor, &number.to_ascii_lowercase(), UserCategory::Student);
    campus
        .directory
        .register_student(
            actor,
            NewStudent {
                user: account.id,
                student_number: number.to_string(),
                programme,
                current_year: 1,
                current_semester: 1,
                admission_date: date(2024, 9, 2),
                admission_type: AdmissionType::Direct,
                sponsor: SponsorType::SelfSponsored,
                guardian: GuardianContact::default(),
            },
        )
        .expect("student registered")
}
