//! Marks sheet import: one CSV row per student and course, recorded for one semester.

use std::io::Read;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::derivation::GradeLetter;
use super::domain::{Grade, GradeEntry};
use super::service::GradingService;
use crate::events::EventPublisher;
use crate::ids::{Actor, EnrollmentId, SemesterId};
use crate::records_error::{ErrorKind, Precondition, RecordsError, Violation};
use crate::store::{Database, Tables};

pub const MARKS_SHEET_HEADER: [&str; 6] =
    ["student_id", "course_code", "cat", "final", "practical", "project"];

#[derive(Debug, Clone, Deserialize)]
struct MarksRow {
    student_id: String,
    course_code: String,
    cat: Option<Decimal>,
    #[serde(rename = "final")]
    final_exam: Option<Decimal>,
    practical: Option<Decimal>,
    project: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedGrade {
    pub line: u64,
    pub enrollment: EnrollmentId,
    pub letter: Option<GradeLetter>,
    pub total_marks: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    pub line: u64,
    pub student_id: String,
    pub course_code: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub recorded: Vec<ImportedGrade>,
    pub failures: Vec<ImportFailure>,
}

impl<D, E> GradingService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    /// Import a marks sheet for `semester`. Each row commits on its own; rejected rows
    /// are reported with the constraint they broke.
    pub fn import_marks(
        &self,
        actor: Actor,
        semester: SemesterId,
        source: impl Read,
    ) -> Result<ImportReport, RecordsError> {
        self.context().lookup(|tables| Ok(tables.semesters.fetch(semester)?.id))?;

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
        let headers = reader.headers().map_err(|err| Violation::InvalidFormat {
            field: "marks sheet",
            value: err.to_string(),
        })?;
        if headers.iter().ne(MARKS_SHEET_HEADER) {
            return Err(Violation::Mismatch {
                field: "marks sheet header",
                expected: MARKS_SHEET_HEADER.join(","),
            }
            .into());
        }

        let mut report = ImportReport::default();
        for (index, record) in reader.deserialize::<MarksRow>().enumerate() {
            let line = index as u64 + 2;
            let row = match record {
                Ok(row) => row,
                Err(err) => {
                    warn!(line, error = %err, "unreadable marks row");
                    report.failures.push(ImportFailure {
                        line,
                        student_id: String::new(),
                        course_code: String::new(),
                        code: "invalid_format",
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match self.import_row(actor, semester, &row) {
                Ok((enrollment, grade)) => report.recorded.push(ImportedGrade {
                    line,
                    enrollment,
                    letter: grade.letter,
                    total_marks: grade.total_marks,
                }),
                Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                Err(err) => {
                    warn!(line, student = %row.student_id, course = %row.course_code, code = err.code(), "marks row rejected");
                    report.failures.push(ImportFailure {
                        line,
                        student_id: row.student_id,
                        course_code: row.course_code,
                        code: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            %semester,
            recorded = report.recorded.len(),
            failed = report.failures.len(),
            %actor,
            "marks sheet imported"
        );
        Ok(report)
    }

    fn import_row(
        &self,
        actor: Actor,
        semester: SemesterId,
        row: &MarksRow,
    ) -> Result<(EnrollmentId, Grade), RecordsError> {
        let enrollment = self
            .context()
            .lookup(|tables| resolve_enrollment(tables, semester, row))?;
        let grade = self.record_grade(
            actor,
            GradeEntry {
                enrollment,
                cat: row.cat,
                final_exam: row.final_exam,
                practical: row.practical,
                project: row.project,
                remarks: None,
                exam_date: None,
            },
        )?;
        Ok((enrollment, grade))
    }
}

fn resolve_enrollment(
    tables: &Tables,
    semester: SemesterId,
    row: &MarksRow,
) -> Result<EnrollmentId, RecordsError> {
    let student = tables
        .students
        .find(|student| student.student_number.eq_ignore_ascii_case(&row.student_id))
        .ok_or_else(|| RecordsError::not_found("student", &row.student_id))?;
    let course = tables
        .courses
        .find(|course| course.code.eq_ignore_ascii_case(&row.course_code))
        .ok_or_else(|| RecordsError::not_found("course", &row.course_code))?;

    tables
        .enrollments
        .find(|enrollment| {
            enrollment.student == student.id
                && enrollment.course == course.id
                && enrollment.semester == semester
        })
        .map(|enrollment| enrollment.id)
        .ok_or_else(|| {
            Precondition::NotEnrolled {
                course: course.code.clone(),
            }
            .into()
        })
}
