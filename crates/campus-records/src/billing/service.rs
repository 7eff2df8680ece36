use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::domain::{
    check_receipt, receipt_prefix, FeeAccount, FeePayment, FeeStatement, FeeStatus, FeeStructure,
    NewFeeStructure, PaymentRequest, PaymentStatus,
};
use crate::context::CoreContext;
use crate::directory::active_programme;
use crate::events::{DomainEvent, EventPublisher, Outbox};
use crate::ids::{AcademicYearId, Actor, FeePaymentId, FeeStructureId, StudentId};
use crate::records_error::{Precondition, RecordsError, Violation};
use crate::store::{Database, Tables};
use crate::validation::positive_amount;

const MACHINE: &str = "fee payment";

/// Fee structures, payments and the reconciliation between them.
pub struct BillingService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> BillingService<D, E>
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

    pub fn create_fee_structure(
        &self,
        actor: Actor,
        new: NewFeeStructure,
    ) -> Result<FeeStructure, RecordsError> {
        let structure = self
            .ctx
            .commit(|tables, _| insert_fee_structure(tables, new))?;

        info!(
            fee_structure = %structure.id,
            programme = %structure.programme,
            year = structure.year,
            semester = structure.semester,
            net_fee = %structure.net_fee(),
            %actor,
            "fee structure created"
        );
        Ok(structure)
    }

    pub fn fee_structure(&self, id: FeeStructureId) -> Result<FeeStructure, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.fee_structures.fetch(id)?.clone()))
    }

    /// Record a payment against a fee structure. Amounts above the outstanding balance
    /// are rejected unless `allow_overpay` is set, in which case the surplus is booked
    /// as a refund row offsetting this payment.
    pub fn record_payment(
        &self,
        actor: Actor,
        request: PaymentRequest,
    ) -> Result<FeePayment, RecordsError> {
        positive_amount(request.amount)?;

        let payment = self.ctx.commit(|tables, outbox| {
            let student = tables.students.fetch(request.student)?;
            let structure = tables.fee_structures.fetch(request.fee_structure)?;
            if structure.programme != student.programme {
                return Err(Precondition::FeeStructureMismatch.into());
            }
            let start_year = tables
                .academic_years
                .fetch(structure.academic_year)?
                .start_year();
            let prefix = receipt_prefix(start_year, &student.number_suffix(), structure.semester);
            let receipt = request.receipt_number.trim().to_ascii_uppercase();
            check_receipt(&receipt, &prefix)?;

            let balance = balance_of(tables, request.student, request.fee_structure)?;
            if request.amount > balance && !request.allow_overpay {
                return Err(Violation::AmountExceedsBalance {
                    requested: request.amount,
                    balance,
                }
                .into());
            }

            let status = if request.pending {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Completed
            };
            let id = tables.fee_payments.insert_with(|id| FeePayment {
                id,
                student: request.student,
                fee_structure: request.fee_structure,
                receipt_number: receipt,
                amount: request.amount,
                payment_date: request.payment_date,
                method: request.method,
                status,
                references: request.references,
                remarks: request.remarks,
                processed_by: Some(actor.user()),
                allow_overpay: request.allow_overpay,
                compensates: None,
            })?;

            if status == PaymentStatus::Completed {
                settle(tables, outbox, actor, id, balance)?;
            }
            Ok(tables.fee_payments.fetch(id)?.clone())
        })?;

        info!(
            payment = %payment.id,
            receipt = %payment.receipt_number,
            amount = %payment.amount,
            status = payment.status.label(),
            %actor,
            "fee payment recorded"
        );
        Ok(payment)
    }

    /// Complete a pending payment once the channel has confirmed it. The balance is
    /// checked again, since other payments may have completed in the meantime.
    pub fn confirm_payment(
        &self,
        actor: Actor,
        payment: FeePaymentId,
    ) -> Result<FeePayment, RecordsError> {
        let confirmed = self.ctx.commit(|tables, outbox| {
            let row = pending_payment(tables, payment, PaymentStatus::Completed)?;
            let balance = balance_of(tables, row.student, row.fee_structure)?;
            if row.amount > balance && !row.allow_overpay {
                return Err(Violation::AmountExceedsBalance {
                    requested: row.amount,
                    balance,
                }
                .into());
            }
            tables.fee_payments.update(payment, |row| {
                row.status = PaymentStatus::Completed;
                row.processed_by = Some(actor.user());
            })?;
            settle(tables, outbox, actor, payment, balance)?;
            Ok(tables.fee_payments.fetch(payment)?.clone())
        })?;

        info!(%payment, %actor, "fee payment confirmed");
        Ok(confirmed)
    }

    pub fn fail_payment(
        &self,
        actor: Actor,
        payment: FeePaymentId,
        reason: &str,
    ) -> Result<FeePayment, RecordsError> {
        let failed = self.ctx.commit(|tables, _| {
            pending_payment(tables, payment, PaymentStatus::Failed)?;
            tables.fee_payments.update(payment, |row| {
                row.status = PaymentStatus::Failed;
                row.remarks = reason.to_string();
                row.processed_by = Some(actor.user());
            })?;
            Ok(tables.fee_payments.fetch(payment)?.clone())
        })?;

        info!(%payment, %actor, "fee payment failed");
        Ok(failed)
    }

    /// Offset whatever is still standing of a completed payment with a reversal row.
    pub fn reverse_payment(
        &self,
        actor: Actor,
        payment: FeePaymentId,
        reason: &str,
    ) -> Result<FeePayment, RecordsError> {
        let today = self.ctx.today();
        let reversal = self.ctx.commit(|tables, _| {
            let original = compensable(tables, payment, PaymentStatus::Reversed)?;
            let remaining = original.amount - compensated(tables, payment);
            if remaining <= Decimal::ZERO {
                return Err(RecordsError::transition(
                    MACHINE,
                    PaymentStatus::Refunded.label(),
                    PaymentStatus::Reversed.label(),
                ));
            }
            let receipt = format!("{}-REV", original.receipt_number);
            compensate(
                tables,
                &original,
                receipt,
                remaining,
                PaymentStatus::Reversed,
                reason,
                actor,
                today,
            )
        })?;

        info!(%payment, reversal = %reversal.id, amount = %reversal.amount, %actor, "fee payment reversed");
        Ok(reversal)
    }

    /// Refund part or all of a completed payment.
    pub fn refund_payment(
        &self,
        actor: Actor,
        payment: FeePaymentId,
        amount: Decimal,
        reason: &str,
    ) -> Result<FeePayment, RecordsError> {
        positive_amount(amount)?;
        let today = self.ctx.today();

        let refund = self.ctx.commit(|tables, _| {
            let original = compensable(tables, payment, PaymentStatus::Refunded)?;
            let available = original.amount - compensated(tables, payment);
            if amount > available {
                return Err(Precondition::RefundExceedsPayment {
                    requested: amount,
                    available,
                }
                .into());
            }
            let sequence = tables
                .fee_payments
                .filter(|row| {
                    row.compensates == Some(payment) && row.receipt_number.contains("-REF")
                })
                .count()
                + 1;
            let receipt = format!("{}-REF{sequence}", original.receipt_number);
            compensate(
                tables,
                &original,
                receipt,
                amount,
                PaymentStatus::Refunded,
                reason,
                actor,
                today,
            )
        })?;

        info!(%payment, refund = %refund.id, amount = %refund.amount, %actor, "fee payment refunded");
        Ok(refund)
    }

    pub fn paid_to_date(
        &self,
        student: StudentId,
        fee_structure: FeeStructureId,
    ) -> Result<Decimal, RecordsError> {
        self.ctx.query(|tables| paid_to_date(tables, student, fee_structure))
    }

    pub fn account(
        &self,
        student: StudentId,
        fee_structure: FeeStructureId,
    ) -> Result<FeeAccount, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            account_of(tables, student, fee_structure)
        })
    }

    /// Statement over every structure the student has paid against plus the one for
    /// the current semester of their standing, ordered by academic year then semester.
    pub fn statement(&self, student: StudentId) -> Result<FeeStatement, RecordsError> {
        debug!(%student, "building fee statement");
        self.ctx.lookup(|tables| build_statement(tables, student))
    }

    pub fn fees_cleared(
        &self,
        student: StudentId,
        academic_year: AcademicYearId,
    ) -> Result<bool, RecordsError> {
        let tolerance = self.ctx.policy().fee_clearance_tolerance;
        self.ctx
            .lookup(|tables| fees_cleared(tables, student, academic_year, tolerance))
    }
}

pub(super) fn insert_fee_structure(
    tables: &mut Tables,
    new: NewFeeStructure,
) -> Result<FeeStructure, RecordsError> {
    new.validate()?;
    new.check_net_fee()?;
    let programme = active_programme(tables, new.programme)?;
    if new.year > programme.duration_years {
        return Err(Violation::out_of_range("year", 1, programme.duration_years, new.year).into());
    }
    if new.semester > programme.semesters_per_year {
        return Err(Violation::out_of_range(
            "semester",
            1,
            programme.semesters_per_year,
            new.semester,
        )
        .into());
    }
    tables.academic_years.fetch(new.academic_year)?;

    let id = tables.fee_structures.insert_with(|id| FeeStructure {
        id,
        programme: new.programme,
        academic_year: new.academic_year,
        year: new.year,
        semester: new.semester,
        components: new.components,
        government_subsidy: new.government_subsidy,
        scholarship_amount: new.scholarship_amount,
    })?;
    Ok(tables.fee_structures.fetch(id)?.clone())
}

/// Σ completed payments minus Σ reversal and refund rows.
pub(crate) fn paid_to_date(
    tables: &Tables,
    student: StudentId,
    fee_structure: FeeStructureId,
) -> Decimal {
    tables
        .fee_payments
        .filter(|row| row.student == student && row.fee_structure == fee_structure)
        .map(FeePayment::ledger_amount)
        .sum()
}

fn balance_of(
    tables: &Tables,
    student: StudentId,
    fee_structure: FeeStructureId,
) -> Result<Decimal, RecordsError> {
    let net = tables.fee_structures.fetch(fee_structure)?.net_fee();
    Ok(net - paid_to_date(tables, student, fee_structure))
}

/// Book the surplus of a just-completed payment and stage the completion event.
fn settle(
    tables: &mut Tables,
    outbox: &mut Outbox,
    actor: Actor,
    payment: FeePaymentId,
    balance_before: Decimal,
) -> Result<(), RecordsError> {
    let row = tables.fee_payments.fetch(payment)?.clone();
    let surplus = row.amount - balance_before.max(Decimal::ZERO);
    if surplus > Decimal::ZERO {
        let receipt = format!("{}-R", row.receipt_number);
        compensate(
            tables,
            &row,
            receipt,
            surplus,
            PaymentStatus::Refunded,
            "overpayment surplus",
            actor,
            row.payment_date,
        )?;
    }

    outbox.push(DomainEvent::PaymentCompleted {
        payment,
        student: row.student,
        fee_structure: row.fee_structure,
        amount: row.amount,
        actor,
    });
    Ok(())
}

fn pending_payment(
    tables: &Tables,
    payment: FeePaymentId,
    target: PaymentStatus,
) -> Result<FeePayment, RecordsError> {
    let row = tables.fee_payments.fetch(payment)?;
    if row.status != PaymentStatus::Pending {
        return Err(RecordsError::transition(MACHINE, row.status.label(), target.label()));
    }
    Ok(row.clone())
}

fn compensable(
    tables: &Tables,
    payment: FeePaymentId,
    target: PaymentStatus,
) -> Result<FeePayment, RecordsError> {
    let row = tables.fee_payments.fetch(payment)?;
    if row.status != PaymentStatus::Completed || row.is_compensation() {
        return Err(RecordsError::transition(MACHINE, row.status.label(), target.label()));
    }
    Ok(row.clone())
}

fn compensated(tables: &Tables, payment: FeePaymentId) -> Decimal {
    tables
        .fee_payments
        .filter(|row| row.compensates == Some(payment))
        .map(|row| row.amount)
        .sum()
}

#[allow(clippy::too_many_arguments)]
fn compensate(
    tables: &mut Tables,
    original: &FeePayment,
    receipt_number: String,
    amount: Decimal,
    status: PaymentStatus,
    reason: &str,
    actor: Actor,
    payment_date: NaiveDate,
) -> Result<FeePayment, RecordsError> {
    let id = tables.fee_payments.insert_with(|id| FeePayment {
        id,
        student: original.student,
        fee_structure: original.fee_structure,
        receipt_number,
        amount,
        payment_date,
        method: original.method,
        status,
        references: original.references.clone(),
        remarks: reason.to_string(),
        processed_by: Some(actor.user()),
        allow_overpay: false,
        compensates: Some(original.id),
    })?;
    Ok(tables.fee_payments.fetch(id)?.clone())
}

fn account_of(
    tables: &Tables,
    student: StudentId,
    fee_structure: FeeStructureId,
) -> Result<FeeAccount, RecordsError> {
    let structure = tables.fee_structures.fetch(fee_structure)?;
    let label = tables
        .academic_years
        .fetch(structure.academic_year)?
        .label
        .clone();
    let paid = paid_to_date(tables, student, fee_structure);
    let net = structure.net_fee();
    Ok(FeeAccount {
        fee_structure,
        academic_year: label,
        year: structure.year,
        semester: structure.semester,
        total_fee: structure.total_fee(),
        government_subsidy: structure.government_subsidy,
        scholarship_amount: structure.scholarship_amount,
        net_fee: net,
        paid_to_date: paid,
        balance: (net - paid).max(Decimal::ZERO),
        status: FeeStatus::classify(paid, net),
        payments: tables
            .fee_payments
            .filter(|row| row.student == student && row.fee_structure == fee_structure)
            .cloned()
            .collect(),
    })
}

pub(crate) fn build_statement(
    tables: &Tables,
    student: StudentId,
) -> Result<FeeStatement, RecordsError> {
    let row = tables.students.fetch(student)?;

    let mut structures: Vec<&FeeStructure> = tables
        .fee_structures
        .filter(|structure| {
            tables
                .fee_payments
                .find(|payment| payment.student == student && payment.fee_structure == structure.id)
                .is_some()
        })
        .collect();
    if let Some(current_year) = tables.cursor.current_year {
        if let Some(current) = tables.fee_structures.find(|structure| {
            structure.covers(row.programme, current_year, row.current_year)
                && structure.semester == row.current_semester
        }) {
            if !structures.iter().any(|known| known.id == current.id) {
                structures.push(current);
            }
        }
    }

    let mut accounts = Vec::with_capacity(structures.len());
    for structure in structures {
        accounts.push(account_of(tables, student, structure.id)?);
    }
    accounts.sort_by(|a, b| {
        (a.academic_year.as_str(), a.year, a.semester).cmp(&(
            b.academic_year.as_str(),
            b.year,
            b.semester,
        ))
    });

    let total_due = accounts.iter().map(|account| account.net_fee).sum();
    let total_paid = accounts.iter().map(|account| account.paid_to_date).sum();
    let total_balance = accounts.iter().map(|account| account.balance).sum();
    Ok(FeeStatement {
        student,
        student_number: row.student_number.clone(),
        accounts,
        total_due,
        total_paid,
        total_balance,
    })
}

/// Fee clearance for promotion: sponsored students are exempt; everyone else must have
/// paid the year's net fees to within `tolerance`.
pub(crate) fn fees_cleared(
    tables: &Tables,
    student: StudentId,
    academic_year: AcademicYearId,
    tolerance: Decimal,
) -> Result<bool, RecordsError> {
    let row = tables.students.fetch(student)?;
    if row.sponsor.exempt_from_fee_clearance() {
        return Ok(true);
    }

    let mut due = Decimal::ZERO;
    let mut paid = Decimal::ZERO;
    for structure in tables
        .fee_structures
        .filter(|structure| structure.covers(row.programme, academic_year, row.current_year))
    {
        due += structure.net_fee();
        paid += paid_to_date(tables, student, structure.id);
    }
    Ok(paid >= due - tolerance)
}
