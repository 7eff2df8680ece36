use std::collections::BTreeSet;

use tracing::{debug, info};

use super::domain::{
    validate_standing, Course, CurriculumSlot, Department, Faculty, Lecturer, NewCourse,
    NewDepartment, NewFaculty, NewLecturer, NewProgramme, NewStaffMember, NewStudent, NewUser,
    Programme, ProgrammeCourse, StaffMember, Student, StudentListing, StudentStatus, User,
    UserCategory,
};
use super::prerequisites::PrerequisiteGraph;
use crate::context::CoreContext;
use crate::events::EventPublisher;
use crate::ids::{Actor, CourseId, DepartmentId, FacultyId, ProgrammeId, StudentId, UserId};
use crate::records_error::{Precondition, RecordsError};
use crate::store::{Database, Tables};
use crate::validation::{in_range, normalise_code, required};

/// Organisation directory, curriculum map and people profiles.
pub struct DirectoryService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> DirectoryService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub(crate) fn context(&self) -> &CoreContext<D, E> {
        &self.ctx
    }

    pub fn create_user(&self, actor: Actor, new: NewUser) -> Result<User, RecordsError> {
        new.validate(self.ctx.today())?;
        let created_at = self.ctx.now();

        let user = self.ctx.commit(|tables, _| {
            let id = tables
                .users
                .insert_with(|id| User::from_new(id, new, created_at))?;
            Ok(tables.users.fetch(id)?.clone())
        })?;

        info!(user = %user.id, username = %user.username, %actor, "user created");
        Ok(user)
    }

    pub fn deactivate_user(&self, actor: Actor, user: UserId) -> Result<(), RecordsError> {
        self.ctx
            .commit(|tables, _| Ok(tables.users.update(user, |row| row.is_active = false)?))?;
        info!(%user, %actor, "user deactivated");
        Ok(())
    }

    pub fn create_faculty(&self, actor: Actor, new: NewFaculty) -> Result<Faculty, RecordsError> {
        required("name", &new.name)?;
        let code = normalise_code("code", &new.code)?;

        let faculty = self.ctx.commit(|tables, _| {
            ensure_user(tables, new.dean)?;
            let id = tables.faculties.insert_with(|id| Faculty {
                id,
                name: new.name,
                code,
                description: new.description,
                dean: new.dean,
                established_date: new.established_date,
                is_active: true,
            })?;
            Ok(tables.faculties.fetch(id)?.clone())
        })?;

        info!(faculty = %faculty.id, code = %faculty.code, %actor, "faculty created");
        Ok(faculty)
    }

    /// Replace a faculty's attributes; a code change that collides fails with `CodeConflict`.
    pub fn update_faculty(
        &self,
        actor: Actor,
        faculty: FacultyId,
        update: NewFaculty,
    ) -> Result<Faculty, RecordsError> {
        required("name", &update.name)?;
        let code = normalise_code("code", &update.code)?;

        let updated = self.ctx.commit(|tables, _| {
            ensure_user(tables, update.dean)?;
            let current = tables.faculties.fetch(faculty)?.clone();
            let row = Faculty {
                name: update.name,
                code,
                description: update.description,
                dean: update.dean,
                established_date: update.established_date,
                ..current
            };
            tables.faculties.replace(faculty, row.clone())?;
            Ok(row)
        })?;

        info!(%faculty, %actor, "faculty updated");
        Ok(updated)
    }

    pub fn deactivate_faculty(&self, actor: Actor, faculty: FacultyId) -> Result<(), RecordsError> {
        self.ctx.commit(|tables, _| {
            Ok(tables
                .faculties
                .update(faculty, |row| row.is_active = false)?)
        })?;
        info!(%faculty, %actor, "faculty deactivated");
        Ok(())
    }

    pub fn create_department(
        &self,
        actor: Actor,
        new: NewDepartment,
    ) -> Result<Department, RecordsError> {
        required("name", &new.name)?;
        let code = normalise_code("code", &new.code)?;

        let department = self.ctx.commit(|tables, _| {
            active_faculty(tables, new.faculty)?;
            ensure_user(tables, new.head)?;
            let id = tables.departments.insert_with(|id| Department {
                id,
                name: new.name,
                code,
                faculty: new.faculty,
                head: new.head,
                description: new.description,
                established_date: new.established_date,
                is_active: true,
            })?;
            Ok(tables.departments.fetch(id)?.clone())
        })?;

        info!(department = %department.id, code = %department.code, %actor, "department created");
        Ok(department)
    }

    /// Moving a department to another faculty refreshes the faculty cached on its programmes.
    pub fn update_department(
        &self,
        actor: Actor,
        department: DepartmentId,
        update: NewDepartment,
    ) -> Result<Department, RecordsError> {
        required("name", &update.name)?;
        let code = normalise_code("code", &update.code)?;

        let (updated, refreshed) = self.ctx.commit(|tables, _| {
            let current = tables.departments.fetch(department)?.clone();
            if current.faculty != update.faculty {
                active_faculty(tables, update.faculty)?;
            }
            ensure_user(tables, update.head)?;

            let row = Department {
                name: update.name,
                code,
                faculty: update.faculty,
                head: update.head,
                description: update.description,
                established_date: update.established_date,
                ..current
            };
            tables.departments.replace(department, row.clone())?;

            let owned: Vec<ProgrammeId> = tables
                .programmes
                .filter(|programme| {
                    programme.department == department && programme.faculty != row.faculty
                })
                .map(|programme| programme.id)
                .collect();
            for programme in &owned {
                tables
                    .programmes
                    .update(*programme, |cached| cached.faculty = row.faculty)?;
            }

            Ok((row, owned.len()))
        })?;

        info!(%department, refreshed_programmes = refreshed, %actor, "department updated");
        Ok(updated)
    }

    pub fn deactivate_department(
        &self,
        actor: Actor,
        department: DepartmentId,
    ) -> Result<(), RecordsError> {
        self.ctx.commit(|tables, _| {
            Ok(tables
                .departments
                .update(department, |row| row.is_active = false)?)
        })?;
        info!(%department, %actor, "department deactivated");
        Ok(())
    }

    pub fn create_programme(
        &self,
        actor: Actor,
        new: NewProgramme,
    ) -> Result<Programme, RecordsError> {
        new.validate()?;
        let code = normalise_code("code", &new.code)?;

        let programme = self.ctx.commit(|tables, _| {
            let faculty = active_department(tables, new.department)?.faculty;
            let id = tables.programmes.insert_with(|id| Programme {
                id,
                name: new.name,
                code,
                programme_type: new.programme_type,
                study_mode: new.study_mode,
                department: new.department,
                faculty,
                duration_years: new.duration_years,
                semesters_per_year: new.semesters_per_year,
                total_semesters: new.total_semesters,
                credit_hours_required: new.credit_hours_required,
                entry_requirements: new.entry_requirements,
                is_active: true,
            })?;
            Ok(tables.programmes.fetch(id)?.clone())
        })?;

        info!(programme = %programme.id, code = %programme.code, %actor, "programme created");
        Ok(programme)
    }

    pub fn update_programme(
        &self,
        actor: Actor,
        programme: ProgrammeId,
        update: NewProgramme,
    ) -> Result<Programme, RecordsError> {
        update.validate()?;
        let code = normalise_code("code", &update.code)?;

        let updated = self.ctx.commit(|tables, _| {
            let current = tables.programmes.fetch(programme)?.clone();
            let faculty = if current.department == update.department {
                tables.departments.fetch(update.department)?.faculty
            } else {
                active_department(tables, update.department)?.faculty
            };
            structure_fits(tables, &current, update.duration_years, update.semesters_per_year)?;
            let row = Programme {
                name: update.name,
                code,
                programme_type: update.programme_type,
                study_mode: update.study_mode,
                department: update.department,
                faculty,
                duration_years: update.duration_years,
                semesters_per_year: update.semesters_per_year,
                total_semesters: update.total_semesters,
                credit_hours_required: update.credit_hours_required,
                entry_requirements: update.entry_requirements,
                ..current
            };
            tables.programmes.replace(programme, row.clone())?;
            Ok(row)
        })?;

        info!(%programme, %actor, "programme updated");
        Ok(updated)
    }

    pub fn deactivate_programme(
        &self,
        actor: Actor,
        programme: ProgrammeId,
    ) -> Result<(), RecordsError> {
        self.ctx.commit(|tables, _| {
            Ok(tables
                .programmes
                .update(programme, |row| row.is_active = false)?)
        })?;
        info!(%programme, %actor, "programme deactivated");
        Ok(())
    }

    pub fn create_course(&self, actor: Actor, new: NewCourse) -> Result<Course, RecordsError> {
        new.validate()?;
        let code = normalise_code("code", &new.code)?;

        let course = self.ctx.commit(|tables, _| {
            active_department(tables, new.department)?;
            let id = tables.courses.insert_with(|id| Course {
                id,
                name: new.name,
                code,
                course_type: new.course_type,
                level: new.level,
                credit_hours: new.credit_hours,
                contact_hours: new.contact_hours,
                department: new.department,
                description: new.description,
                prerequisites: BTreeSet::new(),
                is_active: true,
            })?;
            Ok(tables.courses.fetch(id)?.clone())
        })?;

        info!(course = %course.id, code = %course.code, %actor, "course created");
        Ok(course)
    }

    pub fn update_course(
        &self,
        actor: Actor,
        course: CourseId,
        update: NewCourse,
    ) -> Result<Course, RecordsError> {
        update.validate()?;
        let code = normalise_code("code", &update.code)?;

        let updated = self.ctx.commit(|tables, _| {
            let current = tables.courses.fetch(course)?.clone();
            if current.department != update.department {
                active_department(tables, update.department)?;
            }
            let row = Course {
                name: update.name,
                code,
                course_type: update.course_type,
                level: update.level,
                credit_hours: update.credit_hours,
                contact_hours: update.contact_hours,
                department: update.department,
                description: update.description,
                ..current
            };
            tables.courses.replace(course, row.clone())?;
            Ok(row)
        })?;

        info!(%course, %actor, "course updated");
        Ok(updated)
    }

    pub fn deactivate_course(&self, actor: Actor, course: CourseId) -> Result<(), RecordsError> {
        self.ctx
            .commit(|tables, _| Ok(tables.courses.update(course, |row| row.is_active = false)?))?;
        info!(%course, %actor, "course deactivated");
        Ok(())
    }

    /// Require `prerequisite` before `course`. Fails with `CycleDetected` when the
    /// relation would stop being acyclic.
    pub fn add_prerequisite(
        &self,
        actor: Actor,
        course: CourseId,
        prerequisite: CourseId,
    ) -> Result<(), RecordsError> {
        self.ctx.commit(|tables, _| {
            let dependent = tables.courses.fetch(course)?;
            let required = tables.courses.fetch(prerequisite)?;

            let graph = PrerequisiteGraph::from_courses(tables.courses.values());
            if graph.would_cycle(course, prerequisite) {
                return Err(Precondition::CycleDetected {
                    course: dependent.code.clone(),
                    prerequisite: required.code.clone(),
                }
                .into());
            }

            tables.courses.update(course, |row| {
                row.prerequisites.insert(prerequisite);
            })?;
            Ok(())
        })?;

        info!(%course, %prerequisite, %actor, "prerequisite attached");
        Ok(())
    }

    pub fn remove_prerequisite(
        &self,
        actor: Actor,
        course: CourseId,
        prerequisite: CourseId,
    ) -> Result<(), RecordsError> {
        self.ctx.commit(|tables, _| {
            Ok(tables.courses.update(course, |row| {
                row.prerequisites.remove(&prerequisite);
            })?)
        })?;
        info!(%course, %prerequisite, %actor, "prerequisite detached");
        Ok(())
    }

    /// Idempotent on (programme, course, year, semester): a repeat call only refreshes
    /// the mandatory flag and reactivates the row.
    pub fn upsert_curriculum(
        &self,
        actor: Actor,
        slot: CurriculumSlot,
    ) -> Result<ProgrammeCourse, RecordsError> {
        let entry = self
            .ctx
            .commit(|tables, _| upsert_curriculum_row(tables, slot))?;

        info!(
            programme = %slot.programme,
            course = %slot.course,
            year = slot.year,
            semester = slot.semester,
            %actor,
            "curriculum entry upserted"
        );
        Ok(entry)
    }

    pub fn register_lecturer(
        &self,
        actor: Actor,
        new: NewLecturer,
    ) -> Result<Lecturer, RecordsError> {
        required("employee_number", &new.employee_number)?;

        let lecturer = self.ctx.commit(|tables, _| {
            let user = active_user(tables, new.user)?;
            if !user.category.teaches() {
                return Err(Precondition::CategoryMismatch {
                    expected: UserCategory::Lecturer.label(),
                    found: user.category.label(),
                }
                .into());
            }
            active_department(tables, new.department)?;
            let id = tables.lecturers.insert_with(|id| Lecturer {
                id,
                user: new.user,
                employee_number: new.employee_number.trim().to_string(),
                department: new.department,
                rank: new.rank,
                employment_type: new.employment_type,
                highest_qualification: new.highest_qualification,
                joining_date: new.joining_date,
                contract_end_date: new.contract_end_date,
                is_active: true,
            })?;
            Ok(tables.lecturers.fetch(id)?.clone())
        })?;

        info!(lecturer = %lecturer.id, user = %lecturer.user, %actor, "lecturer registered");
        Ok(lecturer)
    }

    pub fn register_student(&self, actor: Actor, new: NewStudent) -> Result<Student, RecordsError> {
        required("student_number", &new.student_number)?;

        let student = self.ctx.commit(|tables, _| {
            let user = active_user(tables, new.user)?;
            if user.category != UserCategory::Student {
                return Err(Precondition::CategoryMismatch {
                    expected: UserCategory::Student.label(),
                    found: user.category.label(),
                }
                .into());
            }
            let programme = active_programme(tables, new.programme)?;
            validate_standing(programme, new.current_year, new.current_semester)?;

            let id = tables.students.insert_with(|id| Student {
                id,
                user: new.user,
                student_number: new.student_number.trim().to_string(),
                programme: new.programme,
                current_year: new.current_year,
                current_semester: new.current_semester,
                admission_date: new.admission_date,
                admission_type: new.admission_type,
                sponsor: new.sponsor,
                status: StudentStatus::Active,
                cumulative_gpa: None,
                total_credit_hours: 0,
                guardian: new.guardian,
            })?;
            Ok(tables.students.fetch(id)?.clone())
        })?;

        info!(student = %student.id, number = %student.student_number, %actor, "student registered");
        Ok(student)
    }

    pub fn register_staff(
        &self,
        actor: Actor,
        new: NewStaffMember,
    ) -> Result<StaffMember, RecordsError> {
        required("employee_number", &new.employee_number)?;
        required("designation", &new.designation)?;

        let member = self.ctx.commit(|tables, _| {
            active_user(tables, new.user)?;
            if let Some(department) = new.department {
                active_department(tables, department)?;
            }
            let id = tables.staff.insert_with(|id| StaffMember {
                id,
                user: new.user,
                employee_number: new.employee_number.trim().to_string(),
                category: new.category,
                department: new.department,
                designation: new.designation,
                joining_date: new.joining_date,
                is_active: true,
            })?;
            Ok(tables.staff.fetch(id)?.clone())
        })?;

        info!(staff = %member.id, user = %member.user, %actor, "staff member registered");
        Ok(member)
    }

    /// Move a student to another year/semester of their programme.
    pub fn update_student_standing(
        &self,
        actor: Actor,
        student: StudentId,
        year: u8,
        semester: u8,
    ) -> Result<Student, RecordsError> {
        in_range("current_semester", semester, 1, 3)?;

        let updated = self.ctx.commit(|tables, _| {
            let programme = tables.students.fetch(student)?.programme;
            validate_standing(tables.programmes.fetch(programme)?, year, semester)?;
            tables.students.update(student, |row| {
                row.current_year = year;
                row.current_semester = semester;
            })?;
            Ok(tables.students.fetch(student)?.clone())
        })?;

        info!(%student, year, semester, %actor, "student standing updated");
        Ok(updated)
    }

    pub fn set_student_status(
        &self,
        actor: Actor,
        student: StudentId,
        status: StudentStatus,
    ) -> Result<(), RecordsError> {
        self.ctx
            .commit(|tables, _| Ok(tables.students.update(student, |row| row.status = status)?))?;
        info!(%student, status = status.label(), %actor, "student status changed");
        Ok(())
    }

    pub fn user(&self, user: UserId) -> Result<User, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.users.fetch(user)?.clone()))
    }

    pub fn student(&self, student: StudentId) -> Result<Student, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.students.fetch(student)?.clone()))
    }

    pub fn course_by_code(&self, code: &str) -> Result<Course, RecordsError> {
        let code = normalise_code("code", code)?;
        self.ctx.lookup(|tables| {
            tables
                .courses
                .find(|course| course.code == code)
                .cloned()
                .ok_or_else(|| RecordsError::not_found("course", &code))
        })
    }

    pub fn curriculum(&self, programme: ProgrammeId) -> Result<Vec<ProgrammeCourse>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.programmes.fetch(programme)?;
            let mut rows: Vec<ProgrammeCourse> = tables
                .curriculum
                .filter(|row| row.programme == programme && row.is_active)
                .cloned()
                .collect();
            rows.sort_by_key(|row| (row.year, row.semester, row.course));
            Ok(rows)
        })
    }

    /// Students of a programme ordered by student number.
    pub fn students_by_programme(
        &self,
        programme: ProgrammeId,
    ) -> Result<Vec<StudentListing>, RecordsError> {
        debug!(%programme, "listing programme students");
        self.ctx.lookup(|tables| {
            tables.programmes.fetch(programme)?;
            let mut listing = Vec::new();
            for student in tables.students.filter(|row| row.programme == programme) {
                let user = tables.users.fetch(student.user)?;
                listing.push(StudentListing {
                    student: student.id,
                    student_number: student.student_number.clone(),
                    name: user.full_name(),
                    current_year: student.current_year,
                    current_semester: student.current_semester,
                    status: student.status,
                    cumulative_gpa: student.cumulative_gpa,
                });
            }
            listing.sort_by(|a, b| a.student_number.cmp(&b.student_number));
            Ok(listing)
        })
    }
}

pub(crate) fn upsert_curriculum_row(
    tables: &mut Tables,
    slot: CurriculumSlot,
) -> Result<ProgrammeCourse, RecordsError> {
    let programme = active_programme(tables, slot.programme)?;
    in_range("year", slot.year, 1, programme.duration_years)?;
    in_range("semester", slot.semester, 1, programme.semesters_per_year)?;
    active_course(tables, slot.course)?;

    let existing = tables
        .curriculum
        .find(|row| row.matches(slot.programme, slot.course, slot.year, slot.semester))
        .map(|row| row.id);

    let id = match existing {
        Some(id) => {
            tables.curriculum.update(id, |row| {
                row.is_mandatory = slot.is_mandatory;
                row.is_active = true;
            })?;
            id
        }
        None => tables.curriculum.insert_with(|id| ProgrammeCourse {
            id,
            programme: slot.programme,
            course: slot.course,
            year: slot.year,
            semester: slot.semester,
            is_mandatory: slot.is_mandatory,
            is_active: true,
        })?,
    };

    Ok(tables.curriculum.fetch(id)?.clone())
}

/// Students and curriculum rows of the programme must still fit a reshaped programme.
fn structure_fits(
    tables: &Tables,
    programme: &Programme,
    duration_years: u8,
    semesters_per_year: u8,
) -> Result<(), RecordsError> {
    let outside = |year: u8, semester: u8| year > duration_years || semester > semesters_per_year;

    if let Some(student) = tables.students.find(|row| {
        row.programme == programme.id && outside(row.current_year, row.current_semester)
    }) {
        return Err(Precondition::ProgrammeStructureInUse {
            holder: format!("student {}", student.student_number),
            year: student.current_year,
            semester: student.current_semester,
        }
        .into());
    }

    if let Some(slot) = tables
        .curriculum
        .find(|row| row.programme == programme.id && outside(row.year, row.semester))
    {
        let course = tables.courses.fetch(slot.course)?;
        return Err(Precondition::ProgrammeStructureInUse {
            holder: format!("course {}", course.code),
            year: slot.year,
            semester: slot.semester,
        }
        .into());
    }
    Ok(())
}

fn ensure_user(tables: &Tables, user: Option<UserId>) -> Result<(), RecordsError> {
    if let Some(user) = user {
        tables.users.fetch(user)?;
    }
    Ok(())
}

pub(crate) fn active_user(tables: &Tables, user: UserId) -> Result<&User, RecordsError> {
    let row = tables.users.fetch(user)?;
    if !row.is_active {
        return Err(RecordsError::inactive("user", user));
    }
    Ok(row)
}

fn active_faculty(tables: &Tables, faculty: FacultyId) -> Result<&Faculty, RecordsError> {
    let row = tables.faculties.fetch(faculty)?;
    if !row.is_active {
        return Err(RecordsError::inactive("faculty", &row.code));
    }
    Ok(row)
}

pub(crate) fn active_department(
    tables: &Tables,
    department: DepartmentId,
) -> Result<&Department, RecordsError> {
    let row = tables.departments.fetch(department)?;
    if !row.is_active {
        return Err(RecordsError::inactive("department", &row.code));
    }
    Ok(row)
}

pub(crate) fn active_programme(
    tables: &Tables,
    programme: ProgrammeId,
) -> Result<&Programme, RecordsError> {
    let row = tables.programmes.fetch(programme)?;
    if !row.is_active {
        return Err(RecordsError::inactive("programme", &row.code));
    }
    Ok(row)
}

pub(crate) fn active_course(tables: &Tables, course: CourseId) -> Result<&Course, RecordsError> {
    let row = tables.courses.fetch(course)?;
    if !row.is_active {
        return Err(RecordsError::inactive("course", &row.code));
    }
    Ok(row)
}
