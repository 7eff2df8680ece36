use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::domain::{
    deferment_end, ClearanceAction, ClearanceAssessment, ClearanceDecision, ClearanceRequest,
    ClearanceScope, ClearanceStatus, DefermentApplication, DefermentDecision, DefermentStatus,
    ExamSitting, NewClearanceRequest, NewDefermentApplication, NewSpecialExamApplication,
    SpecialExamAction, SpecialExamApplication, SpecialExamStatus, SpecialExamType,
};
use crate::billing::build_statement;
use crate::context::CoreContext;
use crate::directory::{Student, StudentStatus};
use crate::events::{EventPublisher, Outbox};
use crate::hostel::BookingStatus;
use crate::ids::{Actor, ClearanceId, DefermentId, SpecialExamId, StudentId};
use crate::notifications::{self, NewNotification, NotificationType, Priority};
use crate::records_error::{Precondition, RecordsError, Violation};
use crate::store::{Database, Tables};
use crate::validation::{ordered, required};

/// Clearance requests, special exam applications and deferments filed by students.
pub struct StudentAffairsService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> StudentAffairsService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    /// File a clearance request. The office's records are checked straight away; a
    /// request with anything outstanding starts in `requires_action`.
    pub fn request_clearance(
        &self,
        actor: Actor,
        new: NewClearanceRequest,
    ) -> Result<ClearanceRequest, RecordsError> {
        required("reason", &new.reason)?;
        let requested_at = self.ctx.now();

        let request = self.ctx.commit(|tables, _| {
            let student = tables.students.fetch(new.student)?.clone();
            let assessment = assess(tables, &student, new.clearance_type.scope())?;
            let status = if assessment.is_clear() {
                ClearanceStatus::Pending
            } else {
                ClearanceStatus::RequiresAction
            };
            let id = tables.clearances.insert_with(|id| ClearanceRequest {
                id,
                student: new.student,
                clearance_type: new.clearance_type,
                reason: new.reason,
                requested_at,
                status,
                assessment,
                additional_requirements: String::new(),
                processed_by: None,
                processed_at: None,
                remarks: String::new(),
            })?;
            Ok(tables.clearances.fetch(id)?.clone())
        })?;

        info!(
            clearance = %request.id,
            student = %request.student,
            kind = request.clearance_type.label(),
            status = request.status.label(),
            %actor,
            "clearance requested"
        );
        Ok(request)
    }

    /// Decide a clearance request. Approval re-checks the office's records and is
    /// refused while anything is outstanding.
    pub fn process_clearance(
        &self,
        actor: Actor,
        clearance: ClearanceId,
        action: ClearanceAction,
        decision: ClearanceDecision,
    ) -> Result<ClearanceRequest, RecordsError> {
        let now = self.ctx.now();

        let updated = self.ctx.commit(|tables, outbox| {
            let current = tables.clearances.fetch(clearance)?.clone();
            let next = current.status.apply(action)?;
            let student = tables.students.fetch(current.student)?.clone();
            let assessment = assess(tables, &student, current.clearance_type.scope())?;
            if next == ClearanceStatus::Approved && !assessment.is_clear() {
                return Err(Precondition::ClearanceOutstanding {
                    outstanding: assessment.summary(),
                }
                .into());
            }

            tables.clearances.update(clearance, |row| {
                row.status = next;
                row.assessment = assessment;
                row.processed_by = Some(actor.user());
                row.processed_at = Some(now);
                if let Some(remarks) = decision.remarks {
                    row.remarks = remarks;
                }
                if let Some(requirements) = decision.additional_requirements {
                    row.additional_requirements = requirements;
                }
            })?;
            let row = tables.clearances.fetch(clearance)?.clone();

            let message = match next {
                ClearanceStatus::RequiresAction if !row.assessment.is_clear() => format!(
                    "Your {} clearance needs action: {}",
                    row.clearance_type.label(),
                    row.assessment.summary()
                ),
                _ => format!(
                    "Your {} clearance is {}.",
                    row.clearance_type.label(),
                    next.label()
                ),
            };
            notify(
                tables,
                outbox,
                actor,
                &student,
                "Clearance update",
                message,
                NotificationType::General,
                now,
            )?;
            Ok(row)
        })?;

        info!(%clearance, status = updated.status.label(), %actor, "clearance processed");
        Ok(updated)
    }

    pub fn clearances_of(&self, student: StudentId) -> Result<Vec<ClearanceRequest>, RecordsError> {
        debug!(%student, "listing clearance requests");
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .clearances
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }

    /// Apply for a special sitting of a course the student is enrolled in. A failed
    /// exam retake needs a failing grade on that enrollment.
    pub fn apply_special_exam(
        &self,
        actor: Actor,
        new: NewSpecialExamApplication,
    ) -> Result<SpecialExamApplication, RecordsError> {
        new.validate()?;
        let applied_at = self.ctx.now();
        let today = self.ctx.today();
        ordered(
            "original_exam_date",
            new.original_exam_date,
            "application_date",
            today,
        )?;

        let application = self.ctx.commit(|tables, _| {
            let student = tables.students.fetch(new.student)?;
            if student.status != StudentStatus::Active {
                return Err(Precondition::StudentNotActive {
                    student: student.student_number.clone(),
                    status: student.status.label(),
                }
                .into());
            }
            tables.semesters.fetch(new.semester)?;
            let course_code = tables.courses.fetch(new.course)?.code.clone();

            let enrollment = tables.enrollments.find(|row| {
                row.student == new.student
                    && row.course == new.course
                    && row.semester == new.semester
                    && row.is_active
                    && !row.is_audit
            });
            let Some(enrollment) = enrollment else {
                return Err(Precondition::NotEnrolled {
                    course: course_code,
                }
                .into());
            };
            if new.application_type == SpecialExamType::FailedExam {
                let failed = enrollment
                    .grade
                    .as_ref()
                    .is_some_and(|grade| grade.is_failed_unit());
                if !failed {
                    return Err(Precondition::NothingToRetake {
                        course: course_code,
                    }
                    .into());
                }
            }

            let id = tables.special_exams.insert_with(|id| SpecialExamApplication {
                id,
                student: new.student,
                course: new.course,
                semester: new.semester,
                application_type: new.application_type,
                reason: new.reason,
                original_exam_date: new.original_exam_date,
                applied_at,
                status: SpecialExamStatus::Pending,
                processed_by: None,
                processed_at: None,
                admin_remarks: String::new(),
                sitting: None,
                application_fee: new.application_fee,
                fee_paid: new.application_fee == Decimal::ZERO,
                payment_reference: String::new(),
            })?;
            Ok(tables.special_exams.fetch(id)?.clone())
        })?;

        info!(
            application = %application.id,
            student = %application.student,
            course = %application.course,
            %actor,
            "special exam applied for"
        );
        Ok(application)
    }

    /// Mark the application fee as paid against a payment reference.
    pub fn record_special_exam_fee(
        &self,
        actor: Actor,
        application: SpecialExamId,
        payment_reference: &str,
    ) -> Result<SpecialExamApplication, RecordsError> {
        required("payment_reference", payment_reference)?;

        let updated = self.ctx.commit(|tables, _| {
            let status = tables.special_exams.fetch(application)?.status;
            if status.is_terminal() {
                return Err(RecordsError::transition(
                    "special exam application",
                    status.label(),
                    "fee_paid",
                ));
            }
            tables.special_exams.update(application, |row| {
                row.fee_paid = true;
                row.payment_reference = payment_reference.trim().to_string();
            })?;
            Ok(tables.special_exams.fetch(application)?.clone())
        })?;

        info!(%application, %actor, "special exam fee recorded");
        Ok(updated)
    }

    pub fn decide_special_exam(
        &self,
        actor: Actor,
        application: SpecialExamId,
        approve: bool,
        remarks: &str,
    ) -> Result<SpecialExamApplication, RecordsError> {
        let action = if approve {
            SpecialExamAction::Approve
        } else {
            SpecialExamAction::Reject
        };
        self.move_special_exam(actor, application, action, remarks, None)
    }

    /// Arrange the sitting of an approved application. Any application fee must be
    /// paid first.
    pub fn schedule_special_exam(
        &self,
        actor: Actor,
        application: SpecialExamId,
        sitting: ExamSitting,
    ) -> Result<SpecialExamApplication, RecordsError> {
        sitting.validate()?;
        self.move_special_exam(actor, application, SpecialExamAction::Schedule, "", Some(sitting))
    }

    pub fn complete_special_exam(
        &self,
        actor: Actor,
        application: SpecialExamId,
    ) -> Result<SpecialExamApplication, RecordsError> {
        self.move_special_exam(actor, application, SpecialExamAction::Complete, "", None)
    }

    pub fn special_exams_of(
        &self,
        student: StudentId,
    ) -> Result<Vec<SpecialExamApplication>, RecordsError> {
        debug!(%student, "listing special exam applications");
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .special_exams
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }

    fn move_special_exam(
        &self,
        actor: Actor,
        application: SpecialExamId,
        action: SpecialExamAction,
        remarks: &str,
        sitting: Option<ExamSitting>,
    ) -> Result<SpecialExamApplication, RecordsError> {
        let now = self.ctx.now();

        let updated = self.ctx.commit(|tables, outbox| {
            let current = tables.special_exams.fetch(application)?.clone();
            let next = current.status.apply(action)?;
            if let Some(sitting) = &sitting {
                if current.fee_outstanding() {
                    return Err(Precondition::ApplicationFeeUnpaid.into());
                }
                ordered("now", now, "starts_at", sitting.starts_at)?;
                ordered(
                    "original_exam_date",
                    current.original_exam_date,
                    "starts_at",
                    sitting.starts_at.date_naive(),
                )?;
            }

            tables.special_exams.update(application, |row| {
                row.status = next;
                if matches!(action, SpecialExamAction::Approve | SpecialExamAction::Reject) {
                    row.processed_by = Some(actor.user());
                    row.processed_at = Some(now);
                }
                if !remarks.is_empty() {
                    row.admin_remarks = remarks.to_string();
                }
                if sitting.is_some() {
                    row.sitting = sitting.clone();
                }
            })?;
            let row = tables.special_exams.fetch(application)?.clone();

            if action != SpecialExamAction::Complete {
                let student = tables.students.fetch(row.student)?.clone();
                let course = tables.courses.fetch(row.course)?.code.clone();
                let message = match &row.sitting {
                    Some(sitting) if next == SpecialExamStatus::Scheduled => format!(
                        "Special exam for {course} on {} at {} ({} minutes).",
                        sitting.starts_at.format("%Y-%m-%d %H:%M"),
                        sitting.venue,
                        sitting.duration_minutes
                    ),
                    _ => format!("Special exam application for {course} is {}.", next.label()),
                };
                notify(
                    tables,
                    outbox,
                    actor,
                    &student,
                    "Special exam",
                    message,
                    NotificationType::Exam,
                    now,
                )?;
            }
            Ok(row)
        })?;

        info!(%application, status = updated.status.label(), %actor, "special exam application moved");
        Ok(updated)
    }

    /// Apply to suspend studies for 1 to 24 months. One open application per student.
    pub fn apply_deferment(
        &self,
        actor: Actor,
        new: NewDefermentApplication,
    ) -> Result<DefermentApplication, RecordsError> {
        new.validate()?;
        let applied_at = self.ctx.now();

        let application = self.ctx.commit(|tables, _| {
            let student = tables.students.fetch(new.student)?;
            if student.status != StudentStatus::Active {
                return Err(Precondition::StudentNotActive {
                    student: student.student_number.clone(),
                    status: student.status.label(),
                }
                .into());
            }
            let id = tables.deferments.insert_with(|id| DefermentApplication {
                id,
                student: new.student,
                deferment_type: new.deferment_type,
                reason: new.reason,
                requested_start_date: new.requested_start_date,
                requested_duration_months: new.requested_duration_months,
                applied_at,
                status: DefermentStatus::Pending,
                processed_by: None,
                processed_at: None,
                admin_remarks: String::new(),
                approved_start_date: None,
                approved_end_date: None,
                conditions: String::new(),
            })?;
            Ok(tables.deferments.fetch(id)?.clone())
        })?;

        info!(deferment = %application.id, student = %application.student, %actor, "deferment applied for");
        Ok(application)
    }

    pub fn review_deferment(
        &self,
        actor: Actor,
        deferment: DefermentId,
    ) -> Result<DefermentApplication, RecordsError> {
        let updated = self.ctx.commit(|tables, _| {
            let next = tables.deferments.fetch(deferment)?.status.review()?;
            tables.deferments.update(deferment, |row| row.status = next)?;
            Ok(tables.deferments.fetch(deferment)?.clone())
        })?;

        info!(%deferment, %actor, "deferment under review");
        Ok(updated)
    }

    /// Approve or reject an open deferment. Approval fixes the period and moves the
    /// student to `deferred`.
    pub fn decide_deferment(
        &self,
        actor: Actor,
        deferment: DefermentId,
        approve: bool,
        decision: DefermentDecision,
    ) -> Result<DefermentApplication, RecordsError> {
        let now = self.ctx.now();

        let updated = self.ctx.commit(|tables, outbox| {
            let current = tables.deferments.fetch(deferment)?.clone();
            let next = current.status.decide(approve)?;
            let student = tables.students.fetch(current.student)?.clone();

            let period = if approve {
                if student.status != StudentStatus::Active {
                    return Err(Precondition::StudentNotActive {
                        student: student.student_number.clone(),
                        status: student.status.label(),
                    }
                    .into());
                }
                let start = decision.start_date.unwrap_or(current.requested_start_date);
                let end = deferment_end(start, current.requested_duration_months).ok_or(
                    Violation::InvalidFormat {
                        field: "start_date",
                        value: start.to_string(),
                    },
                )?;
                tables
                    .students
                    .update(student.id, |row| row.status = StudentStatus::Deferred)?;
                Some((start, end))
            } else {
                None
            };

            tables.deferments.update(deferment, |row| {
                row.status = next;
                row.processed_by = Some(actor.user());
                row.processed_at = Some(now);
                row.admin_remarks = decision.remarks;
                row.conditions = decision.conditions;
                row.approved_start_date = period.map(|(start, _)| start);
                row.approved_end_date = period.map(|(_, end)| end);
            })?;

            let message = match period {
                Some((start, end)) => format!("Your deferment is approved from {start} to {end}."),
                None => "Your deferment application was rejected.".to_string(),
            };
            notify(
                tables,
                outbox,
                actor,
                &student,
                "Deferment decision",
                message,
                NotificationType::Academic,
                now,
            )?;
            Ok(tables.deferments.fetch(deferment)?.clone())
        })?;

        info!(%deferment, status = updated.status.label(), %actor, "deferment decided");
        Ok(updated)
    }

    pub fn deferments_of(
        &self,
        student: StudentId,
    ) -> Result<Vec<DefermentApplication>, RecordsError> {
        debug!(%student, "listing deferment applications");
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .deferments
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }
}

/// Fee balance, books still out and hostel beds still held or unpaid.
fn assess(
    tables: &Tables,
    student: &Student,
    scope: ClearanceScope,
) -> Result<ClearanceAssessment, RecordsError> {
    let mut assessment = ClearanceAssessment::default();

    if scope.fees {
        assessment.outstanding_balance += build_statement(tables, student.id)?.total_balance;
    }

    if scope.library {
        for loan in tables
            .loans
            .filter(|loan| loan.borrower == student.user && loan.status.is_open())
        {
            let resource = tables.library_resources.fetch(loan.resource)?;
            assessment
                .items_to_return
                .push(format!("book {}", resource.call_number));
        }
    }

    if scope.accommodation {
        for booking in tables.bookings.filter(|booking| booking.student == student.id) {
            if booking.status.holds_bed() {
                let bed = tables.beds.fetch(booking.bed)?;
                assessment
                    .items_to_return
                    .push(format!("bed {}", bed.bed_number));
            }
            if !matches!(
                booking.status,
                BookingStatus::Rejected | BookingStatus::Cancelled
            ) {
                assessment.outstanding_balance += booking.balance_due().max(Decimal::ZERO);
            }
        }
    }

    Ok(assessment)
}

#[allow(clippy::too_many_arguments)]
fn notify(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    student: &Student,
    title: &str,
    message: String,
    notification_type: NotificationType,
    now: DateTime<Utc>,
) -> Result<(), RecordsError> {
    notifications::queue(
        tables,
        outbox,
        actor.user(),
        NewNotification {
            title: title.to_string(),
            message,
            notification_type,
            priority: Priority::default(),
            recipients: vec![student.user],
            send_email: false,
            send_sms: false,
            scheduled_time: None,
            expires_at: None,
        },
        now,
    )?;
    Ok(())
}
