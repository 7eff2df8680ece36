//! Identity, organisation, curriculum map and people profiles.

mod allocator;
pub mod domain;
pub mod prerequisites;
mod service;

#[cfg(test)]
mod tests;

pub use allocator::{AllocationReport, UnfilledSlot};
pub use domain::{
    age_on, validate_standing, AcademicRank, AdmissionType, ContactHours, Course, CourseLevel,
    CourseType, CurriculumSlot, Department, EmploymentType, Faculty, Gender, GuardianContact,
    Lecturer, NewCourse, NewDepartment, NewFaculty, NewLecturer, NewProgramme, NewStaffMember,
    NewStudent, NewUser, Programme, ProgrammeCourse, ProgrammeType, SponsorType, StaffCategory,
    StaffMember, Student, StudentListing, StudentStatus, StudyMode, User, UserCategory,
    MINIMUM_USER_AGE,
};
pub use prerequisites::PrerequisiteGraph;
pub use service::DirectoryService;
pub(crate) use service::{
    active_course, active_department, active_programme, active_user, upsert_curriculum_row,
};
