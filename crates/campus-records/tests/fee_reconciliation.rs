mod common;

use campus_records::billing::{
    FeeComponents, FeeStatus, FeeStructure, FeeTemplate, NewFeeStructure, PaymentMethod,
    PaymentRequest, PaymentStatus,
};
use campus_records::directory::{NewProgramme, ProgrammeType, Student, StudyMode};
use campus_records::records_error::{ErrorKind, Precondition, RecordsError, Violation};
use common::{date, World};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn structure(world: &World) -> FeeStructure {
    world
        .campus
        .billing
        .create_fee_structure(
            world.actor,
            NewFeeStructure {
                programme: world.programme.id,
                academic_year: world.year.id,
                year: 1,
                semester: 1,
                components: FeeComponents {
                    tuition: dec!(60000),
                    registration: dec!(5000),
                    examination: dec!(5000),
                    library: dec!(10000),
                    ..FeeComponents::default()
                },
                government_subsidy: dec!(30000),
                scholarship_amount: Decimal::ZERO,
            },
        )
        .expect("fee structure created")
}

fn payment(
    student: &Student,
    structure: &FeeStructure,
    amount: Decimal,
    receipt: &str,
) -> PaymentRequest {
    PaymentRequest {
        student: student.id,
        fee_structure: structure.id,
        amount,
        method: PaymentMethod::Mpesa,
        payment_date: date(2024, 9, 10),
        receipt_number: receipt.to_string(),
        references: Default::default(),
        remarks: String::new(),
        allow_overpay: false,
        pending: false,
    }
}

#[test]
fn partial_payments_reconcile_against_the_net_fee() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);
    assert_eq!(structure.total_fee(), dec!(80000));
    assert_eq!(structure.net_fee(), dec!(50000));

    for (amount, receipt) in [(dec!(20000), "FEE240001S1001"), (dec!(10000), "FEE240001S1002")] {
        let recorded = world
            .campus
            .billing
            .record_payment(world.actor, payment(&student, &structure, amount, receipt))
            .expect("payment recorded");
        assert_eq!(recorded.status, PaymentStatus::Completed);
    }

    let account = world
        .campus
        .billing
        .account(student.id, structure.id)
        .expect("account");
    assert_eq!(account.paid_to_date, dec!(30000));
    assert_eq!(account.status, FeeStatus::Partial);
    assert_eq!(account.balance, dec!(20000));

    let err = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(25000), "FEE240001S1003"),
        )
        .expect_err("above the balance");
    assert!(matches!(
        err,
        RecordsError::Validation(Violation::AmountExceedsBalance { requested, balance })
            if requested == dec!(25000) && balance == dec!(20000)
    ));
}

#[test]
fn receipts_must_carry_the_year_student_and_semester_prefix() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);

    let err = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(1000), "FEE250001S1001"),
        )
        .expect_err("wrong year");
    assert_eq!(err.code(), "mismatch");

    world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(1000), "fee240001s1001"),
        )
        .expect("prefix is case-insensitive");
    let err = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(1000), "FEE240001S1001"),
        )
        .expect_err("receipt reused");
    assert_eq!(err.code(), "duplicate_receipt");
}

#[test]
fn overpayment_books_the_surplus_as_a_refund_row() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);

    let mut request = payment(&student, &structure, dec!(55000), "FEE240001S1001");
    request.allow_overpay = true;
    world
        .campus
        .billing
        .record_payment(world.actor, request)
        .expect("overpayment accepted");

    let account = world
        .campus
        .billing
        .account(student.id, structure.id)
        .expect("account");
    assert_eq!(account.paid_to_date, dec!(50000));
    assert_eq!(account.status, FeeStatus::Paid);
    assert_eq!(account.balance, Decimal::ZERO);
    let surplus = account
        .payments
        .iter()
        .find(|row| row.receipt_number == "FEE240001S1001-R")
        .expect("surplus row");
    assert_eq!(surplus.status, PaymentStatus::Refunded);
    assert_eq!(surplus.amount, dec!(5000));
}

#[test]
fn pending_payments_count_once_confirmed() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);

    let mut request = payment(&student, &structure, dec!(10000), "FEE240001S1001");
    request.pending = true;
    let pending = world
        .campus
        .billing
        .record_payment(world.actor, request)
        .expect("pending payment");
    assert_eq!(
        world
            .campus
            .billing
            .paid_to_date(student.id, structure.id)
            .expect("readable"),
        Decimal::ZERO
    );

    world
        .campus
        .billing
        .confirm_payment(world.actor, pending.id)
        .expect("confirmed");
    assert_eq!(
        world
            .campus
            .billing
            .paid_to_date(student.id, structure.id)
            .expect("readable"),
        dec!(10000)
    );

    let err = world
        .campus
        .billing
        .fail_payment(world.actor, pending.id, "bounced")
        .expect_err("already completed");
    assert_eq!(err.kind(), ErrorKind::IllegalTransition);
}

#[test]
fn confirming_a_pending_payment_rechecks_the_balance() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);

    let mut pending = Vec::new();
    for receipt in ["FEE240001S1001", "FEE240001S1002"] {
        let mut request = payment(&student, &structure, dec!(40000), receipt);
        request.pending = true;
        pending.push(
            world
                .campus
                .billing
                .record_payment(world.actor, request)
                .expect("pending payment"),
        );
    }

    world
        .campus
        .billing
        .confirm_payment(world.actor, pending[0].id)
        .expect("first fits the balance");
    let err = world
        .campus
        .billing
        .confirm_payment(world.actor, pending[1].id)
        .expect_err("second overshoots");
    assert!(matches!(
        err,
        RecordsError::Validation(Violation::AmountExceedsBalance { .. })
    ));

    let account = world
        .campus
        .billing
        .account(student.id, structure.id)
        .expect("account");
    assert_eq!(account.paid_to_date, dec!(40000));
    assert_eq!(account.payments.len(), 2);
    assert!(account
        .payments
        .iter()
        .all(|row| row.status != PaymentStatus::Refunded));

    let mut request = payment(&student, &structure, dec!(15000), "FEE240001S1003");
    request.pending = true;
    request.allow_overpay = true;
    let accepted = world
        .campus
        .billing
        .record_payment(world.actor, request)
        .expect("pending overpay");
    world
        .campus
        .billing
        .confirm_payment(world.actor, accepted.id)
        .expect("surplus accepted at recording time");
    let account = world
        .campus
        .billing
        .account(student.id, structure.id)
        .expect("account");
    assert_eq!(account.paid_to_date, dec!(50000));
    assert_eq!(account.status, FeeStatus::Paid);
}

#[test]
fn reversals_and_refunds_offset_paid_to_date() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);
    let first = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(20000), "FEE240001S1001"),
        )
        .expect("first payment");
    let second = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &structure, dec!(10000), "FEE240001S1002"),
        )
        .expect("second payment");

    let refund = world
        .campus
        .billing
        .refund_payment(world.actor, first.id, dec!(5000), "course dropped")
        .expect("partial refund");
    assert_eq!(refund.receipt_number, "FEE240001S1001-REF1");

    let err = world
        .campus
        .billing
        .refund_payment(world.actor, first.id, dec!(16000), "too much")
        .expect_err("only 15,000 left");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::RefundExceedsPayment { .. })
    ));

    let reversal = world
        .campus
        .billing
        .reverse_payment(world.actor, second.id, "cheque bounced")
        .expect("reversed");
    assert_eq!(reversal.amount, dec!(10000));

    assert_eq!(
        world
            .campus
            .billing
            .paid_to_date(student.id, structure.id)
            .expect("readable"),
        dec!(15000)
    );

    let err = world
        .campus
        .billing
        .reverse_payment(world.actor, second.id, "again")
        .expect_err("nothing left to reverse");
    assert_eq!(err.kind(), ErrorKind::IllegalTransition);
}

#[test]
fn payments_must_target_the_students_programme() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let other = world
        .campus
        .directory
        .create_programme(
            world.actor,
            NewProgramme {
                name: "Diploma in IT".to_string(),
                code: "DIP-IT".to_string(),
                programme_type: ProgrammeType::Diploma,
                study_mode: StudyMode::FullTime,
                department: world.programme.department,
                duration_years: 2,
                semesters_per_year: 2,
                total_semesters: 4,
                credit_hours_required: 60,
                entry_requirements: String::new(),
            },
        )
        .expect("second programme");
    let foreign = world
        .campus
        .billing
        .create_fee_structure(
            world.actor,
            NewFeeStructure {
                programme: other.id,
                academic_year: world.year.id,
                year: 1,
                semester: 1,
                components: FeeComponents {
                    tuition: dec!(1000),
                    ..FeeComponents::default()
                },
                government_subsidy: Decimal::ZERO,
                scholarship_amount: Decimal::ZERO,
            },
        )
        .expect("diploma fee structure");

    let err = world
        .campus
        .billing
        .record_payment(
            world.actor,
            payment(&student, &foreign, dec!(1000), "FEE240001S1001"),
        )
        .expect_err("wrong programme");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::FeeStructureMismatch)
    ));
}

#[test]
fn aid_above_the_total_fee_is_refused() {
    let world = World::new();
    let err = world
        .campus
        .billing
        .create_fee_structure(
            world.actor,
            NewFeeStructure {
                programme: world.programme.id,
                academic_year: world.year.id,
                year: 1,
                semester: 1,
                components: FeeComponents {
                    tuition: dec!(10000),
                    ..FeeComponents::default()
                },
                government_subsidy: dec!(8000),
                scholarship_amount: dec!(5000),
            },
        )
        .expect_err("net fee below zero");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::NegativeNetFee { net }) if net == dec!(-3000)
    ));
}

#[test]
fn generator_bills_graduation_only_in_the_final_year_and_is_rerunnable() {
    let world = World::new();
    let template = FeeTemplate::default();

    let report = world
        .campus
        .billing
        .generate_fee_structures(world.actor, world.year.id, &template)
        .expect("generated");
    assert_eq!((report.created, report.skipped), (6, 0));

    let graduation: Vec<(u8, Decimal)> = world
        .campus
        .context()
        .query(|tables| {
            let mut rows: Vec<(u8, Decimal)> = tables
                .fee_structures
                .filter(|row| row.semester == 1)
                .map(|row| (row.year, row.components.graduation))
                .collect();
            rows.sort();
            rows
        })
        .expect("readable");
    assert_eq!(
        graduation,
        vec![
            (1, Decimal::ZERO),
            (2, Decimal::ZERO),
            (3, template.components.graduation)
        ]
    );

    let rerun = world
        .campus
        .billing
        .generate_fee_structures(world.actor, world.year.id, &template)
        .expect("second run");
    assert_eq!((rerun.created, rerun.skipped), (0, 6));
}

#[test]
fn statement_lists_the_current_semester_even_before_payment() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = structure(&world);

    let statement = world
        .campus
        .billing
        .statement(student.id)
        .expect("statement");
    assert_eq!(statement.accounts.len(), 1);
    assert_eq!(statement.accounts[0].fee_structure, structure.id);
    assert_eq!(statement.accounts[0].status, FeeStatus::Pending);
    assert_eq!(statement.total_balance, dec!(50000));
}
