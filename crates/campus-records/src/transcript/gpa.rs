//! GPA arithmetic over graded attempts. Attempts are plain values so the roll-up
//! rules can be exercised without a store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::calendar::semester_position;
use crate::grading::round2;
use crate::ids::{CourseId, EnrollmentId, SemesterId, StudentId};
use crate::records_error::RecordsError;
use crate::store::Tables;

/// One graded, non-audit, active enrollment of a student.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub enrollment: EnrollmentId,
    pub course: CourseId,
    pub semester: SemesterId,
    /// Academic year start and semester number; orders attempts chronologically.
    pub position: (NaiveDate, u8),
    pub credit_hours: u8,
    pub grade_points: Option<Decimal>,
    pub quality_points: Option<Decimal>,
    pub is_passed: bool,
}

impl Attempt {
    fn counts_toward_gpa(&self) -> bool {
        self.grade_points.is_some()
    }
}

/// Σ quality points / Σ credit hours over attempts carrying grade points.
pub fn weighted_gpa<'a>(attempts: impl IntoIterator<Item = &'a Attempt>) -> Option<Decimal> {
    let mut quality = Decimal::ZERO;
    let mut hours = Decimal::ZERO;
    for attempt in attempts.into_iter().filter(|a| a.counts_toward_gpa()) {
        quality += attempt.quality_points.unwrap_or_default();
        hours += Decimal::from(attempt.credit_hours);
    }
    if hours.is_zero() {
        return None;
    }
    Some(round2(quality / hours))
}

pub fn semester_gpa(attempts: &[Attempt], semester: SemesterId) -> Option<Decimal> {
    weighted_gpa(attempts.iter().filter(|a| a.semester == semester))
}

/// Attempts that survive repeat resolution: per course, the most recent passing
/// attempt, otherwise the most recent attempt.
pub fn effective_attempts(attempts: &[Attempt]) -> Vec<&Attempt> {
    let mut by_course: BTreeMap<CourseId, &Attempt> = BTreeMap::new();
    for attempt in attempts.iter().filter(|a| a.counts_toward_gpa()) {
        by_course
            .entry(attempt.course)
            .and_modify(|kept| {
                if supersedes(attempt, *kept) {
                    *kept = attempt;
                }
            })
            .or_insert(attempt);
    }
    by_course.into_values().collect()
}

fn supersedes(candidate: &Attempt, kept: &Attempt) -> bool {
    match (candidate.is_passed, kept.is_passed) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.position > kept.position,
    }
}

pub fn cumulative_gpa(attempts: &[Attempt]) -> Option<Decimal> {
    weighted_gpa(effective_attempts(attempts))
}

/// Credit hours of passed courses, each course counted once.
pub fn earned_credit_hours(attempts: &[Attempt]) -> u32 {
    let mut passed: BTreeMap<CourseId, u8> = BTreeMap::new();
    for attempt in attempts.iter().filter(|a| a.is_passed) {
        passed.insert(attempt.course, attempt.credit_hours);
    }
    passed.values().map(|hours| u32::from(*hours)).sum()
}

/// Graded attempts of a student in chronological order.
pub fn attempts_of(tables: &Tables, student: StudentId) -> Result<Vec<Attempt>, RecordsError> {
    let mut attempts = Vec::new();
    for enrollment in tables
        .enrollments
        .filter(|row| row.student == student && row.is_active && !row.is_audit)
    {
        let Some(grade) = &enrollment.grade else {
            continue;
        };
        let course = tables.courses.fetch(enrollment.course)?;
        attempts.push(Attempt {
            enrollment: enrollment.id,
            course: enrollment.course,
            semester: enrollment.semester,
            position: semester_position(tables, enrollment.semester)?,
            credit_hours: course.credit_hours,
            grade_points: grade.grade_points,
            quality_points: grade.quality_points,
            is_passed: grade.is_passed,
        });
    }
    attempts.sort_by(|a, b| a.position.cmp(&b.position).then(a.enrollment.cmp(&b.enrollment)));
    Ok(attempts)
}

/// Rewrite the cached cumulative GPA and credit-hour total on the student row.
pub(crate) fn refresh_student_standing(
    tables: &mut Tables,
    student: StudentId,
) -> Result<(), RecordsError> {
    let attempts = attempts_of(tables, student)?;
    let gpa = cumulative_gpa(&attempts);
    let hours = earned_credit_hours(&attempts);
    tables.students.update(student, |row| {
        row.cumulative_gpa = gpa;
        row.total_credit_hours = hours;
    })?;
    Ok(())
}
