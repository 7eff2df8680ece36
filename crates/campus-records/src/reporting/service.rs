use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use super::domain::{
    ReportingBatchReport, ReportingRequest, ReportingStatus, ReportingType, StudentReporting,
};
use crate::context::CoreContext;
use crate::events::EventPublisher;
use crate::ids::{Actor, ReportingId, SemesterId, StudentId};
use crate::records_error::RecordsError;
use crate::store::{Database, Tables};

pub struct ReportingService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> ReportingService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    /// File a pending reporting record for a student and semester.
    pub fn report(
        &self,
        actor: Actor,
        request: ReportingRequest,
    ) -> Result<StudentReporting, RecordsError> {
        let reported_at = self.ctx.now();
        let reporting = self.ctx.commit(|tables, _| {
            tables.students.fetch(request.student)?;
            tables.semesters.fetch(request.semester)?;
            let id = tables.reportings.insert_with(|id| StudentReporting {
                id,
                student: request.student,
                semester: request.semester,
                reporting_type: request.reporting_type,
                reported_at,
                remarks: request.remarks,
                status: ReportingStatus::Pending,
                processed_by: None,
                processed_at: None,
            })?;
            Ok(tables.reportings.fetch(id)?.clone())
        })?;

        info!(
            reporting = %reporting.id,
            student = %reporting.student,
            semester = %reporting.semester,
            %actor,
            "student reported"
        );
        Ok(reporting)
    }

    /// Approve or reject a pending record, stamping the processor.
    pub fn process(
        &self,
        actor: Actor,
        reporting: ReportingId,
        approve: bool,
        remarks: Option<String>,
    ) -> Result<StudentReporting, RecordsError> {
        let processed_at = self.ctx.now();
        let updated = self.ctx.commit(|tables, _| {
            let next = tables.reportings.fetch(reporting)?.status.decide(approve)?;
            tables.reportings.update(reporting, |row| {
                row.status = next;
                row.processed_by = Some(actor.user());
                row.processed_at = Some(processed_at);
                if let Some(remarks) = remarks {
                    row.remarks = remarks;
                }
            })?;
            Ok(tables.reportings.fetch(reporting)?.clone())
        })?;

        info!(%reporting, status = updated.status.label(), %actor, "student reporting processed");
        Ok(updated)
    }

    pub fn reportings_of(&self, student: StudentId) -> Result<Vec<StudentReporting>, RecordsError> {
        debug!(%student, "listing reporting records");
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .reportings
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }

    /// Semesters that count toward the student's enrolled progress.
    pub fn approved_semesters(&self, student: StudentId) -> Result<Vec<SemesterId>, RecordsError> {
        self.ctx.query(|tables| approved_semesters(tables, student))
    }

    /// Create approved online reporting records for every semester inside each
    /// student's programme window, skipping those already on file.
    pub fn report_students_to_semesters(
        &self,
        actor: Actor,
    ) -> Result<ReportingBatchReport, RecordsError> {
        let reported_at = self.ctx.now();
        let report = self.ctx.commit(|tables, _| {
            let students: Vec<_> = tables
                .students
                .values()
                .map(|student| (student.id, student.programme, student.admission_date))
                .collect();

            let mut report = ReportingBatchReport {
                students: students.len(),
                ..ReportingBatchReport::default()
            };
            for (student, programme, admitted) in students {
                let programme = tables.programmes.fetch(programme)?;
                let window = semester_window(
                    tables,
                    admitted,
                    programme.duration_years,
                    programme.semesters_per_year,
                );
                for semester in window {
                    let exists = tables
                        .reportings
                        .find(|row| row.student == student && row.semester == semester)
                        .is_some();
                    if exists {
                        report.existing += 1;
                        continue;
                    }
                    tables.reportings.insert_with(|id| StudentReporting {
                        id,
                        student,
                        semester,
                        reporting_type: ReportingType::Online,
                        reported_at,
                        remarks: String::new(),
                        status: ReportingStatus::Approved,
                        processed_by: Some(actor.user()),
                        processed_at: Some(reported_at),
                    })?;
                    report.created += 1;
                }
            }
            Ok(report)
        })?;

        info!(
            students = report.students,
            created = report.created,
            existing = report.existing,
            %actor,
            "students reported to semesters"
        );
        Ok(report)
    }
}

/// Semesters starting from the admission year through the end of the programme's
/// final calendar year, earliest first, capped at the programme's semester count.
fn semester_window(
    tables: &Tables,
    admitted: NaiveDate,
    duration_years: u8,
    semesters_per_year: u8,
) -> Vec<SemesterId> {
    let first_year = admitted.year();
    let last_year = first_year + i32::from(duration_years);
    let total = usize::from(duration_years) * usize::from(semesters_per_year);

    let mut semesters: Vec<_> = tables
        .semesters
        .filter(|semester| {
            let year = semester.start_date.year();
            year >= first_year && year <= last_year
        })
        .map(|semester| (semester.start_date, semester.id))
        .collect();
    semesters.sort();
    semesters.into_iter().take(total).map(|(_, id)| id).collect()
}

fn approved_semesters(tables: &Tables, student: StudentId) -> Vec<SemesterId> {
    tables
        .reportings
        .filter(|row| row.student == student && row.status == ReportingStatus::Approved)
        .map(|row| row.semester)
        .collect()
}
