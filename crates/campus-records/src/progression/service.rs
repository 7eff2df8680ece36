use chrono::NaiveDate;
use tracing::{info, warn};

use super::domain::{
    hold_back_reasons, outcome_message, ProgressionOutcome, ProgressionReport, ProgressionRequest,
};
use crate::billing::fees_cleared;
use crate::context::CoreContext;
use crate::directory::StudentStatus;
use crate::enrollment::{admit, EnrollmentFlags, EnrollmentRequest, RowFailure};
use crate::events::{DomainEvent, EventPublisher, Outbox};
use crate::ids::{
    AcademicYearId, Actor, CourseId, EnrollmentId, LecturerId, SemesterId, StudentId,
};
use crate::notifications::{self, NewNotification, NotificationType, Priority};
use crate::records_error::{ErrorKind, Precondition, RecordsError, Violation};
use crate::store::{Database, Tables};

/// End-of-year promotion: failed-unit limit, fee clearance, repeats and graduation.
pub struct ProgressionService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> ProgressionService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    /// Decide whether a student moves on once every active enrollment of the
    /// academic year carries a grade. Fails with `YearIncomplete` otherwise.
    pub fn evaluate_progression(
        &self,
        actor: Actor,
        request: ProgressionRequest,
    ) -> Result<ProgressionReport, RecordsError> {
        let today = self.ctx.today();
        let now = self.ctx.now();
        let policy = self.ctx.policy().clone();

        let report = self.ctx.commit(|tables, outbox| {
            let student = tables.students.fetch(request.student)?.clone();
            if student.status != StudentStatus::Active {
                return Err(Precondition::StudentNotActive {
                    student: student.student_number.clone(),
                    status: student.status.label(),
                }
                .into());
            }
            let programme = tables.programmes.fetch(student.programme)?.clone();
            let academic_year = tables.semesters.fetch(request.semester)?.academic_year;
            let year_semesters: Vec<SemesterId> = tables
                .semesters
                .filter(|row| {
                    row.academic_year == academic_year && row.number <= programme.semesters_per_year
                })
                .map(|row| row.id)
                .collect();

            let graded: Vec<_> = tables
                .enrollments
                .filter(|row| {
                    row.student == student.id
                        && row.is_active
                        && !row.is_audit
                        && year_semesters.contains(&row.semester)
                })
                .collect();
            if graded.is_empty() || graded.iter().any(|row| row.grade.is_none()) {
                return Err(Precondition::YearIncomplete.into());
            }
            let failed: Vec<_> = graded
                .iter()
                .filter(|row| row.grade.as_ref().is_some_and(|grade| grade.is_failed_unit()))
                .map(|row| (row.course, row.semester, row.lecturer))
                .collect();
            let failed_units = u32::try_from(failed.len()).unwrap_or(u32::MAX);

            let cleared = fees_cleared(
                tables,
                student.id,
                academic_year,
                policy.fee_clearance_tolerance,
            )?;

            let mut repeat_enrollments = Vec::new();
            let mut auto_enrolled = Vec::new();
            let mut auto_enroll_failures = Vec::new();
            let reasons = hold_back_reasons(failed_units, policy.max_failed_units, cleared);

            let outcome = if reasons.is_empty() {
                let (year, semester) = if student.current_semester < programme.semesters_per_year {
                    (student.current_year, student.current_semester + 1)
                } else {
                    (student.current_year + 1, 1)
                };
                if year > programme.duration_years {
                    tables
                        .students
                        .update(student.id, |row| row.status = StudentStatus::Graduated)?;
                    ProgressionOutcome::Graduated
                } else {
                    tables.students.update(student.id, |row| {
                        row.current_year = year;
                        row.current_semester = semester;
                    })?;
                    if let Some(target) = request.auto_enroll_into {
                        let number = tables.semesters.fetch(target)?.number;
                        if number != semester {
                            return Err(Violation::Mismatch {
                                field: "auto_enroll_into",
                                expected: format!("a semester numbered {semester}"),
                            }
                            .into());
                        }
                        let courses: Vec<_> = tables
                            .curriculum
                            .filter(|row| {
                                row.programme == student.programme
                                    && row.year == year
                                    && row.semester == semester
                                    && row.is_active
                            })
                            .map(|row| row.course)
                            .collect();
                        for course in courses {
                            let request = EnrollmentRequest {
                                student: student.id,
                                course,
                                semester: target,
                                lecturer: None,
                                flags: EnrollmentFlags {
                                    force: true,
                                    ..EnrollmentFlags::default()
                                },
                            };
                            match admit(tables, outbox, actor, request, today) {
                                Ok(enrollment) => auto_enrolled.push(enrollment.id),
                                Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                                Err(err) => {
                                    warn!(student = %student.id, %course, error = %err, "auto-enrollment skipped");
                                    auto_enroll_failures.push(RowFailure {
                                        student: student.id,
                                        course,
                                        code: err.code(),
                                        message: err.to_string(),
                                    });
                                }
                            }
                        }
                    }
                    ProgressionOutcome::Promoted { year, semester }
                }
            } else {
                if failed_units > policy.max_failed_units {
                    repeat_enrollments = enroll_repeats(
                        tables,
                        outbox,
                        actor,
                        student.id,
                        academic_year,
                        &failed,
                        today,
                    )?;
                }
                ProgressionOutcome::NotPromoted
            };

            let (title, message) = outcome_message(
                outcome,
                student.current_year,
                failed_units,
                policy.max_failed_units,
                &reasons,
            );
            let notification = notifications::queue(
                tables,
                outbox,
                actor.user(),
                NewNotification {
                    title,
                    message,
                    notification_type: NotificationType::Academic,
                    priority: Priority::High,
                    recipients: vec![student.user],
                    send_email: false,
                    send_sms: false,
                    scheduled_time: None,
                    expires_at: None,
                },
                now,
            )?;

            let standing = tables.students.fetch(student.id)?;
            outbox.push(DomainEvent::StudentProgressed {
                student: student.id,
                outcome: outcome.label().to_string(),
                year: standing.current_year,
                semester: standing.current_semester,
            });

            Ok(ProgressionReport {
                student: student.id,
                outcome,
                failed_units,
                fees_cleared: cleared,
                reasons,
                repeat_enrollments,
                auto_enrolled,
                auto_enroll_failures,
                notification,
            })
        })?;

        info!(
            student = %report.student,
            outcome = report.outcome.label(),
            failed_units = report.failed_units,
            fees_cleared = report.fees_cleared,
            %actor,
            "progression evaluated"
        );
        Ok(report)
    }

    /// Evaluate every active student enrolled in a semester. Students whose year is
    /// still missing grades are skipped.
    pub fn evaluate_semester(
        &self,
        actor: Actor,
        semester: SemesterId,
    ) -> Result<Vec<ProgressionReport>, RecordsError> {
        let students: Vec<StudentId> = self.ctx.query(|tables| {
            tables
                .students
                .filter(|row| row.status == StudentStatus::Active)
                .filter(|row| {
                    tables
                        .enrollments
                        .find(|enrollment| {
                            enrollment.student == row.id && enrollment.semester == semester
                        })
                        .is_some()
                })
                .map(|row| row.id)
                .collect()
        })?;

        let mut reports = Vec::new();
        for student in students {
            let request = ProgressionRequest {
                student,
                semester,
                auto_enroll_into: None,
            };
            match self.evaluate_progression(actor, request) {
                Ok(report) => reports.push(report),
                Err(RecordsError::Precondition(Precondition::YearIncomplete)) => {
                    warn!(%student, %semester, "progression deferred, grades outstanding");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(reports)
    }
}

/// Repeat enrollments for failed courses in the same semester number of the next
/// academic year. Courses already enrolled there are left as they are.
fn enroll_repeats(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    student: StudentId,
    academic_year: AcademicYearId,
    failed: &[(CourseId, SemesterId, Option<LecturerId>)],
    today: NaiveDate,
) -> Result<Vec<EnrollmentId>, RecordsError> {
    let Some(next_year) = next_academic_year(tables, academic_year)? else {
        return Ok(Vec::new());
    };

    let mut created = Vec::new();
    for (course, semester, lecturer) in failed {
        let number = tables.semesters.fetch(*semester)?.number;
        let Some(target) = tables
            .semesters
            .find(|row| row.academic_year == next_year && row.number == number)
            .map(|row| row.id)
        else {
            continue;
        };
        let exists = tables
            .enrollments
            .find(|row| row.student == student && row.course == *course && row.semester == target)
            .is_some();
        if exists {
            continue;
        }
        let request = EnrollmentRequest {
            student,
            course: *course,
            semester: target,
            lecturer: *lecturer,
            flags: EnrollmentFlags {
                repeat: true,
                override_prereq: true,
                force: true,
                ..EnrollmentFlags::default()
            },
        };
        created.push(admit(tables, outbox, actor, request, today)?.id);
    }
    Ok(created)
}

/// The academic year starting soonest after this one ends.
fn next_academic_year(
    tables: &Tables,
    academic_year: AcademicYearId,
) -> Result<Option<AcademicYearId>, RecordsError> {
    let ends = tables.academic_years.fetch(academic_year)?.end_date;
    Ok(tables
        .academic_years
        .filter(|row| row.start_date > ends)
        .min_by_key(|row| row.start_date)
        .map(|row| row.id))
}
