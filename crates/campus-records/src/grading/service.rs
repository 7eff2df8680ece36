use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::derivation::{derive, derive_override};
use super::domain::{Grade, GradeEntry, GradeOverride};
use crate::context::CoreContext;
use crate::events::{DomainEvent, EventPublisher, Outbox};
use crate::ids::{Actor, EnrollmentId};
use crate::records_error::{Precondition, RecordsError};
use crate::store::{Database, Tables};
use crate::transcript::refresh_student_standing;

/// Attaches grades to enrollments and keeps the student's cached standing current.
pub struct GradingService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> GradingService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub(super) fn context(&self) -> &CoreContext<D, E> {
        &self.ctx
    }

    pub fn record_grade(&self, actor: Actor, entry: GradeEntry) -> Result<Grade, RecordsError> {
        let marks = entry.marks();
        marks.validate()?;
        let recorded_at = self.ctx.now();

        let grade = self
            .ctx
            .commit(|tables, outbox| record_in(tables, outbox, actor, entry, recorded_at))?;

        info!(
            letter = grade.letter.map(|letter| letter.as_str()).unwrap_or("pending"),
            total = ?grade.total_marks,
            passed = grade.is_passed,
            %actor,
            "grade recorded"
        );
        Ok(grade)
    }

    /// Set an administrative letter (I, W, P, NP). Marks already entered are kept.
    pub fn override_grade(
        &self,
        actor: Actor,
        request: GradeOverride,
    ) -> Result<Grade, RecordsError> {
        let recorded_at = self.ctx.now();
        let enrollment = request.enrollment;

        let grade = self.ctx.commit(|tables, outbox| {
            let existing = gradable(tables, enrollment)?;
            let marks = existing
                .as_ref()
                .map(|grade| grade.marks)
                .unwrap_or_default();
            let derived = derive_override(&marks, request.letter, request.passed)?;
            let remarks = request
                .remarks
                .or_else(|| existing.as_ref().map(|grade| grade.remarks.clone()))
                .unwrap_or_default();
            let exam_date = existing.as_ref().and_then(|grade| grade.exam_date);
            attach(
                tables,
                outbox,
                actor,
                enrollment,
                Grade::new(marks, derived, exam_date, remarks, actor.user(), recorded_at),
            )
        })?;

        info!(%enrollment, letter = %request.letter, %actor, "grade overridden");
        Ok(grade)
    }

    pub fn grade(&self, enrollment: EnrollmentId) -> Result<Option<Grade>, RecordsError> {
        debug!(%enrollment, "reading grade");
        self.ctx
            .lookup(|tables| Ok(tables.enrollments.fetch(enrollment)?.grade.clone()))
    }
}

fn record_in(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    entry: GradeEntry,
    recorded_at: DateTime<Utc>,
) -> Result<Grade, RecordsError> {
    let marks = entry.marks();
    let existing = gradable(tables, entry.enrollment)?;
    let course = tables
        .enrollments
        .fetch(entry.enrollment)
        .map(|row| row.course)?;
    let credit_hours = tables.courses.fetch(course)?.credit_hours;

    let derived = derive(&marks, credit_hours);
    let remarks = entry
        .remarks
        .or_else(|| existing.as_ref().map(|grade| grade.remarks.clone()))
        .unwrap_or_default();
    let exam_date = entry
        .exam_date
        .or_else(|| existing.as_ref().and_then(|grade| grade.exam_date));

    attach(
        tables,
        outbox,
        actor,
        entry.enrollment,
        Grade::new(marks, derived, exam_date, remarks, actor.user(), recorded_at),
    )
}

/// The enrollment must be active and graded (not audit). Returns the current grade.
fn gradable(tables: &Tables, enrollment: EnrollmentId) -> Result<Option<Grade>, RecordsError> {
    let row = tables.enrollments.fetch(enrollment)?;
    if row.is_audit {
        return Err(Precondition::AuditHasNoGrade.into());
    }
    if !row.is_active {
        return Err(Precondition::EnrollmentInactive.into());
    }
    Ok(row.grade.clone())
}

fn attach(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    enrollment: EnrollmentId,
    grade: Grade,
) -> Result<Grade, RecordsError> {
    let student = tables.enrollments.fetch(enrollment)?.student;
    let stored = grade.clone();
    tables
        .enrollments
        .update(enrollment, |row| row.grade = Some(stored))?;
    refresh_student_standing(tables, student)?;

    if let Some(letter) = grade.letter {
        outbox.push(DomainEvent::GradeRecorded {
            enrollment,
            letter: letter.as_str().to_string(),
            passed: grade.is_passed,
            actor,
        });
    }
    Ok(grade)
}
