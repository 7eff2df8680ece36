use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::domain::{
    BulkMode, CohortReport, CohortRequest, Enrollment, EnrollmentRequest, RowFailure,
};
use crate::calendar::semester_position;
use crate::context::CoreContext;
use crate::directory::{active_course, PrerequisiteGraph, StudentStatus};
use crate::events::{DomainEvent, EventPublisher, Outbox};
use crate::ids::{Actor, CourseId, EnrollmentId, SemesterId, StudentId};
use crate::records_error::{Conflict, ErrorKind, Precondition, RecordsError, Violation};
use crate::store::{Database, Tables};

/// Admits students to courses and withdraws them.
pub struct EnrollmentService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> EnrollmentService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn enroll(
        &self,
        actor: Actor,
        request: EnrollmentRequest,
    ) -> Result<Enrollment, RecordsError> {
        let today = self.ctx.today();
        let enrollment = self
            .ctx
            .commit(|tables, outbox| admit(tables, outbox, actor, request, today))?;

        info!(
            enrollment = %enrollment.id,
            student = %enrollment.student,
            course = %enrollment.course,
            semester = %enrollment.semester,
            repeat = enrollment.is_repeat,
            audit = enrollment.is_audit,
            %actor,
            "student enrolled"
        );
        Ok(enrollment)
    }

    /// Enroll every active student of a programme year into the curriculum of the
    /// semester. Per-row mode keeps successful rows and reports the failures;
    /// transactional mode rolls everything back on the first failure.
    pub fn enroll_cohort(
        &self,
        actor: Actor,
        request: CohortRequest,
    ) -> Result<CohortReport, RecordsError> {
        let today = self.ctx.today();
        let pairs = self.ctx.lookup(|tables| cohort_pairs(tables, &request))?;

        let report = match request.mode {
            BulkMode::Transactional => self.ctx.commit(|tables, outbox| {
                let mut report = CohortReport::default();
                for (student, course) in &pairs {
                    let enrollment = admit(
                        tables,
                        outbox,
                        actor,
                        cohort_row(&request, *student, *course),
                        today,
                    )?;
                    report.enrolled.push(enrollment.id);
                }
                Ok(report)
            })?,
            BulkMode::PerRow => {
                let mut report = CohortReport::default();
                for (student, course) in pairs {
                    let row = cohort_row(&request, student, course);
                    match self
                        .ctx
                        .commit(|tables, outbox| admit(tables, outbox, actor, row, today))
                    {
                        Ok(enrollment) => report.enrolled.push(enrollment.id),
                        Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                        Err(err) => {
                            warn!(%student, %course, code = err.code(), "cohort row rejected");
                            report.failures.push(RowFailure {
                                student,
                                course,
                                code: err.code(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
                report
            }
        };

        info!(
            programme = %request.programme,
            semester = %request.semester,
            enrolled = report.enrolled.len(),
            failed = report.failures.len(),
            %actor,
            "cohort enrollment finished"
        );
        Ok(report)
    }

    /// Mark an enrollment inactive. I and W grades stay attached; any other grade is
    /// dropped only when no marks were entered.
    pub fn withdraw(
        &self,
        actor: Actor,
        enrollment: EnrollmentId,
    ) -> Result<Enrollment, RecordsError> {
        let withdrawn = self.ctx.commit(|tables, _| {
            let row = tables.enrollments.fetch(enrollment)?;
            if !row.is_active {
                return Err(Precondition::EnrollmentInactive.into());
            }

            tables.enrollments.update(enrollment, |row| {
                row.is_active = false;
                let keep = match &row.grade {
                    Some(grade) => {
                        grade.letter.is_some_and(|letter| letter.survives_withdrawal())
                            || !grade.marks.is_empty()
                    }
                    None => true,
                };
                if !keep {
                    row.grade = None;
                }
            })?;
            Ok(tables.enrollments.fetch(enrollment)?.clone())
        })?;

        info!(%enrollment, retained_grade = withdrawn.grade.is_some(), %actor, "enrollment withdrawn");
        Ok(withdrawn)
    }

    pub fn enrollment(&self, enrollment: EnrollmentId) -> Result<Enrollment, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.enrollments.fetch(enrollment)?.clone()))
    }

    pub fn enrollments_of(&self, student: StudentId) -> Result<Vec<Enrollment>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .enrollments
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }
}

fn cohort_row(request: &CohortRequest, student: StudentId, course: CourseId) -> EnrollmentRequest {
    EnrollmentRequest {
        student,
        course,
        semester: request.semester,
        lecturer: None,
        flags: request.flags,
    }
}

fn cohort_pairs(
    tables: &Tables,
    request: &CohortRequest,
) -> Result<Vec<(StudentId, CourseId)>, RecordsError> {
    tables.programmes.fetch(request.programme)?;
    let semester_number = tables.semesters.fetch(request.semester)?.number;

    let courses: Vec<CourseId> = tables
        .curriculum
        .filter(|row| {
            row.programme == request.programme
                && row.year == request.year
                && row.semester == semester_number
                && row.is_active
        })
        .map(|row| row.course)
        .collect();

    let mut pairs = Vec::new();
    for student in tables.students.filter(|student| {
        student.programme == request.programme
            && student.current_year == request.year
            && student.status == StudentStatus::Active
    }) {
        pairs.extend(courses.iter().map(|course| (student.id, *course)));
    }
    Ok(pairs)
}

/// Run the admission checks in order and insert the enrollment. The first failing
/// check is reported.
pub(crate) fn admit(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    request: EnrollmentRequest,
    today: NaiveDate,
) -> Result<Enrollment, RecordsError> {
    let EnrollmentRequest {
        student,
        course,
        semester,
        lecturer,
        flags,
    } = request;

    let semester_row = tables.semesters.fetch(semester)?.clone();
    if !flags.force && !semester_row.registration_open_on(today) {
        let year = tables.academic_years.fetch(semester_row.academic_year)?;
        return Err(Precondition::RegistrationWindowClosed {
            semester: format!("{} semester {}", year.label, semester_row.number),
        }
        .into());
    }

    let student_row = tables.students.fetch(student)?.clone();
    if student_row.status != StudentStatus::Active {
        return Err(Precondition::StudentNotActive {
            student: student_row.student_number.clone(),
            status: student_row.status.label(),
        }
        .into());
    }

    let course_code = active_course(tables, course)?.code.clone();
    if !flags.audit {
        let programme = tables.programmes.fetch(student_row.programme)?;
        let placed = tables.curriculum.find(|row| {
            row.programme == student_row.programme
                && row.course == course
                && row.semester == semester_row.number
                && row.is_active
                && if flags.repeat {
                    row.year <= programme.duration_years
                } else {
                    row.year == student_row.current_year
                }
        });
        if placed.is_none() {
            return Err(Precondition::NotInCurriculum {
                course: course_code,
                year: student_row.current_year,
                semester: semester_row.number,
            }
            .into());
        }
    }

    let duplicate = tables
        .enrollments
        .find(|row| row.student == student && row.course == course && row.semester == semester)
        .is_some();
    if duplicate {
        return Err(RecordsError::Conflict {
            conflict: Conflict::DuplicateEnrollment,
            key: format!("{}:{}:{}", student_row.student_number, course_code, semester),
        });
    }

    if !flags.override_prereq {
        if let Some(missing) = first_unmet_prerequisite(tables, student, course, semester)? {
            return Err(Precondition::PrerequisiteUnmet { course: missing }.into());
        }
    }

    if flags.repeat && flags.audit {
        return Err(Violation::RepeatAndAudit.into());
    }

    if let Some(lecturer) = lecturer {
        let row = tables.lecturers.fetch(lecturer)?;
        if !row.is_active {
            return Err(RecordsError::inactive("lecturer", &row.employee_number));
        }
    }

    let id = tables.enrollments.insert_with(|id| Enrollment {
        id,
        student,
        course,
        semester,
        lecturer,
        enrolled_on: today,
        is_active: true,
        is_repeat: flags.repeat,
        is_audit: flags.audit,
        grade: None,
    })?;

    outbox.push(DomainEvent::EnrollmentCreated {
        enrollment: id,
        student,
        course,
        semester,
        actor,
    });
    Ok(tables.enrollments.fetch(id)?.clone())
}

/// Code of the first prerequisite in the transitive closure (by code) without a passing
/// grade from an earlier semester.
fn first_unmet_prerequisite(
    tables: &Tables,
    student: StudentId,
    course: CourseId,
    semester: SemesterId,
) -> Result<Option<String>, RecordsError> {
    let graph = PrerequisiteGraph::from_courses(tables.courses.values());
    let closure = graph.closure(course);
    if closure.is_empty() {
        return Ok(None);
    }

    let target = semester_position(tables, semester)?;
    let mut satisfied = BTreeSet::new();
    for enrollment in tables
        .enrollments
        .filter(|row| row.student == student && closure.contains(&row.course) && row.passed())
    {
        if semester_position(tables, enrollment.semester)? < target {
            satisfied.insert(enrollment.course);
        }
    }

    let mut missing: Vec<&str> = Vec::new();
    for prerequisite in closure.difference(&satisfied) {
        missing.push(tables.courses.fetch(*prerequisite)?.code.as_str());
    }
    missing.sort_unstable();
    Ok(missing.first().map(|code| code.to_string()))
}
