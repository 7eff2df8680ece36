use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::gpa::{attempts_of, cumulative_gpa, earned_credit_hours, semester_gpa, Attempt};
use crate::context::CoreContext;
use crate::events::EventPublisher;
use crate::grading::GradeLetter;
use crate::ids::{SemesterId, StudentId};
use crate::records_error::RecordsError;
use crate::store::{Database, Tables};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub course_code: String,
    pub course_name: String,
    pub credit_hours: u8,
    pub letter: Option<GradeLetter>,
    pub grade_points: Option<Decimal>,
    pub quality_points: Option<Decimal>,
    pub is_repeat: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSemester {
    pub semester: SemesterId,
    pub number: u8,
    pub lines: Vec<TranscriptLine>,
    pub semester_gpa: Option<Decimal>,
    /// Cumulative GPA as it stood at the end of this semester.
    pub cumulative_gpa: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptYear {
    pub academic_year: String,
    pub semesters: Vec<TranscriptSemester>,
}

/// Fully resolved transcript: academic year, then semester, then course lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub student: StudentId,
    pub student_number: String,
    pub name: String,
    pub programme_code: String,
    pub programme_name: String,
    pub years: Vec<TranscriptYear>,
    pub cumulative_gpa: Option<Decimal>,
    pub total_credit_hours: u32,
}

pub struct TranscriptService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> TranscriptService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn transcript(&self, student: StudentId) -> Result<Transcript, RecordsError> {
        debug!(%student, "building transcript");
        self.ctx.lookup(|tables| build_transcript(tables, student))
    }

    pub fn semester_gpa(
        &self,
        student: StudentId,
        semester: SemesterId,
    ) -> Result<Option<Decimal>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            tables.semesters.fetch(semester)?;
            Ok(semester_gpa(&attempts_of(tables, student)?, semester))
        })
    }

    pub fn cumulative_gpa(&self, student: StudentId) -> Result<Option<Decimal>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(cumulative_gpa(&attempts_of(tables, student)?))
        })
    }
}

fn build_transcript(tables: &Tables, student: StudentId) -> Result<Transcript, RecordsError> {
    let row = tables.students.fetch(student)?;
    let user = tables.users.fetch(row.user)?;
    let programme = tables.programmes.fetch(row.programme)?;
    let attempts = attempts_of(tables, student)?;

    let mut years: Vec<TranscriptYear> = Vec::new();
    let mut seen: Vec<Attempt> = Vec::new();
    let mut index = 0;
    while index < attempts.len() {
        let semester = attempts[index].semester;
        let group_end = attempts[index..]
            .iter()
            .position(|attempt| attempt.semester != semester)
            .map_or(attempts.len(), |offset| index + offset);
        let group = &attempts[index..group_end];
        seen.extend_from_slice(group);

        let mut lines = Vec::with_capacity(group.len());
        for attempt in group {
            lines.push(transcript_line(tables, attempt)?);
        }

        let semester_row = tables.semesters.fetch(semester)?;
        let label = tables
            .academic_years
            .fetch(semester_row.academic_year)?
            .label
            .clone();
        let entry = TranscriptSemester {
            semester,
            number: semester_row.number,
            lines,
            semester_gpa: semester_gpa(group, semester),
            cumulative_gpa: cumulative_gpa(&seen),
        };
        match years.last_mut() {
            Some(year) if year.academic_year == label => year.semesters.push(entry),
            _ => years.push(TranscriptYear {
                academic_year: label,
                semesters: vec![entry],
            }),
        }
        index = group_end;
    }

    Ok(Transcript {
        student,
        student_number: row.student_number.clone(),
        name: user.full_name(),
        programme_code: programme.code.clone(),
        programme_name: programme.name.clone(),
        years,
        cumulative_gpa: cumulative_gpa(&attempts),
        total_credit_hours: earned_credit_hours(&attempts),
    })
}

fn transcript_line(tables: &Tables, attempt: &Attempt) -> Result<TranscriptLine, RecordsError> {
    let course = tables.courses.fetch(attempt.course)?;
    let enrollment = tables.enrollments.fetch(attempt.enrollment)?;
    let letter = enrollment.grade.as_ref().and_then(|grade| grade.letter);
    Ok(TranscriptLine {
        course_code: course.code.clone(),
        course_name: course.name.clone(),
        credit_hours: attempt.credit_hours,
        letter,
        grade_points: attempt.grade_points,
        quality_points: attempt.quality_points,
        is_repeat: enrollment.is_repeat,
    })
}
