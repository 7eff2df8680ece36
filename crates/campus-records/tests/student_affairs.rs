mod common;

use campus_records::billing::{FeeComponents, NewFeeStructure, PaymentMethod, PaymentRequest};
use campus_records::directory::StudentStatus;
use campus_records::library::{
    BorrowRequest, NewLibraryResource, ResourceType, ReturnCondition, ReturnRequest,
};
use campus_records::notifications::NotificationType;
use campus_records::records_error::{Conflict, Precondition, RecordsError};
use campus_records::student_affairs::{
    ClearanceAction, ClearanceDecision, ClearanceStatus, ClearanceType, DefermentDecision,
    DefermentStatus, DefermentType, ExamSitting, NewClearanceRequest, NewDefermentApplication,
    NewSpecialExamApplication, SpecialExamStatus, SpecialExamType,
};
use chrono::{TimeZone, Utc};
use common::{date, World};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn graduation(student: &campus_records::directory::Student) -> NewClearanceRequest {
    NewClearanceRequest {
        student: student.id,
        clearance_type: ClearanceType::Graduation,
        reason: "completing the programme".to_string(),
    }
}

fn special_exam(
    world: &World,
    student: &campus_records::directory::Student,
    application_type: SpecialExamType,
    application_fee: Decimal,
) -> NewSpecialExamApplication {
    NewSpecialExamApplication {
        student: student.id,
        course: world.intro.id,
        semester: world.first.id,
        application_type,
        reason: "hospitalised during the paper".to_string(),
        original_exam_date: date(2024, 9, 5),
        application_fee,
    }
}

fn sitting(day: u32) -> ExamSitting {
    ExamSitting {
        starts_at: Utc
            .with_ymd_and_hms(2024, 9, day, 9, 0, 0)
            .single()
            .expect("valid instant"),
        venue: "Hall B".to_string(),
        duration_minutes: 120,
    }
}

#[test]
fn graduation_clearance_waits_for_fees_and_books() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let structure = world
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
                    tuition: dec!(40000),
                    ..FeeComponents::default()
                },
                government_subsidy: Decimal::ZERO,
                scholarship_amount: Decimal::ZERO,
            },
        )
        .expect("fee structure created");
    let book = world
        .campus
        .library
        .add_resource(
            world.actor,
            NewLibraryResource {
                title: "Compilers".to_string(),
                author: "Aho".to_string(),
                isbn: String::new(),
                resource_type: ResourceType::Book,
                publisher: String::new(),
                publication_year: Some(2006),
                call_number: "qa76-c65".to_string(),
                total_copies: 1,
                location: String::new(),
                subject_area: String::new(),
                digital_copy_url: String::new(),
            },
        )
        .expect("resource added");
    let loan = world
        .campus
        .library
        .borrow(
            world.actor,
            BorrowRequest {
                borrower: student.user,
                resource: book.id,
                due_date: date(2024, 9, 24),
                remarks: String::new(),
            },
        )
        .expect("loan opened");

    let request = world
        .campus
        .student_affairs
        .request_clearance(world.actor, graduation(&student))
        .expect("clearance requested");
    assert_eq!(request.status, ClearanceStatus::RequiresAction);
    assert_eq!(request.assessment.outstanding_balance, dec!(40000));
    assert_eq!(request.assessment.summary(), "balance 40000, book QA76-C65");

    let err = world
        .campus
        .student_affairs
        .request_clearance(world.actor, graduation(&student))
        .expect_err("one open request per office");
    assert!(matches!(
        err,
        RecordsError::Conflict {
            conflict: Conflict::OpenClearanceRequest,
            ..
        }
    ));

    let err = world
        .campus
        .student_affairs
        .process_clearance(
            world.actor,
            request.id,
            ClearanceAction::Approve,
            ClearanceDecision::default(),
        )
        .expect_err("balance and book outstanding");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::ClearanceOutstanding { ref outstanding })
            if outstanding == "balance 40000, book QA76-C65"
    ));

    world
        .campus
        .billing
        .record_payment(
            world.actor,
            PaymentRequest {
                student: student.id,
                fee_structure: structure.id,
                amount: dec!(40000),
                method: PaymentMethod::Mpesa,
                payment_date: date(2024, 9, 10),
                receipt_number: "FEE240001S1101".to_string(),
                references: Default::default(),
                remarks: String::new(),
                allow_overpay: false,
                pending: false,
            },
        )
        .expect("fees paid");
    world
        .campus
        .library
        .return_loan(
            world.actor,
            loan.id,
            ReturnRequest {
                returned_on: date(2024, 9, 10),
                fine_amount: Decimal::ZERO,
                condition: ReturnCondition::Good,
                remarks: String::new(),
            },
        )
        .expect("returned");

    let approved = world
        .campus
        .student_affairs
        .process_clearance(
            world.actor,
            request.id,
            ClearanceAction::Approve,
            ClearanceDecision {
                remarks: Some("cleared by all offices".to_string()),
                additional_requirements: None,
            },
        )
        .expect("clearance approved");
    assert_eq!(approved.status, ClearanceStatus::Approved);
    assert!(approved.assessment.is_clear());
    assert_eq!(approved.processed_by, Some(world.actor.user()));
    assert_eq!(approved.remarks, "cleared by all offices");

    let again = world
        .campus
        .student_affairs
        .request_clearance(world.actor, graduation(&student))
        .expect("a closed request frees the office");
    assert_eq!(again.status, ClearanceStatus::Pending);
    assert_eq!(
        world
            .campus
            .student_affairs
            .clearances_of(student.id)
            .expect("clearances")
            .len(),
        2
    );
}

#[test]
fn registry_clearance_can_ask_for_more_documents() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let request = world
        .campus
        .student_affairs
        .request_clearance(
            world.actor,
            NewClearanceRequest {
                student: student.id,
                clearance_type: ClearanceType::Registry,
                reason: "transcript collection".to_string(),
            },
        )
        .expect("clearance requested");
    assert_eq!(request.status, ClearanceStatus::Pending);

    let asked = world
        .campus
        .student_affairs
        .process_clearance(
            world.actor,
            request.id,
            ClearanceAction::RequireAction,
            ClearanceDecision {
                remarks: None,
                additional_requirements: Some("certified ID copy".to_string()),
            },
        )
        .expect("action required");
    assert_eq!(asked.status, ClearanceStatus::RequiresAction);
    assert_eq!(asked.additional_requirements, "certified ID copy");

    let inbox = world
        .campus
        .notifications
        .inbox(student.user, true)
        .expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].notification_type, NotificationType::General);
}

#[test]
fn special_exams_are_scheduled_only_once_the_fee_is_paid() {
    let world = World::new();
    let student = world.student("SCT-0001");
    world.enroll(&student, world.intro.id, world.first.id);

    let application = world
        .campus
        .student_affairs
        .apply_special_exam(
            world.actor,
            special_exam(&world, &student, SpecialExamType::SickExam, dec!(1000)),
        )
        .expect("applied");
    assert_eq!(application.status, SpecialExamStatus::Pending);
    assert!(application.fee_outstanding());

    let err = world
        .campus
        .student_affairs
        .apply_special_exam(
            world.actor,
            special_exam(&world, &student, SpecialExamType::MissedExam, dec!(1000)),
        )
        .expect_err("one open application per course and semester");
    assert!(matches!(
        err,
        RecordsError::Conflict {
            conflict: Conflict::OpenSpecialExamApplication,
            ..
        }
    ));

    let err = world
        .campus
        .student_affairs
        .schedule_special_exam(world.actor, application.id, sitting(20))
        .expect_err("not approved yet");
    assert!(matches!(
        err,
        RecordsError::IllegalTransition {
            from: "pending",
            to: "scheduled",
            ..
        }
    ));

    let approved = world
        .campus
        .student_affairs
        .decide_special_exam(world.actor, application.id, true, "medical note attached")
        .expect("approved");
    assert_eq!(approved.status, SpecialExamStatus::Approved);
    assert_eq!(approved.admin_remarks, "medical note attached");

    let err = world
        .campus
        .student_affairs
        .schedule_special_exam(world.actor, application.id, sitting(20))
        .expect_err("fee unpaid");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::ApplicationFeeUnpaid)
    ));

    world
        .campus
        .student_affairs
        .record_special_exam_fee(world.actor, application.id, "SPX-0042")
        .expect("fee recorded");
    let err = world
        .campus
        .student_affairs
        .schedule_special_exam(world.actor, application.id, sitting(9))
        .expect_err("sitting in the past");
    assert_eq!(err.code(), "date_order");

    let scheduled = world
        .campus
        .student_affairs
        .schedule_special_exam(world.actor, application.id, sitting(20))
        .expect("scheduled");
    assert_eq!(scheduled.status, SpecialExamStatus::Scheduled);
    assert_eq!(scheduled.sitting, Some(sitting(20)));
    assert_eq!(scheduled.payment_reference, "SPX-0042");

    let completed = world
        .campus
        .student_affairs
        .complete_special_exam(world.actor, application.id)
        .expect("completed");
    assert_eq!(completed.status, SpecialExamStatus::Completed);

    let inbox = world
        .campus
        .notifications
        .inbox(student.user, false)
        .expect("inbox");
    assert_eq!(inbox.len(), 2);
    assert!(inbox
        .iter()
        .all(|notification| notification.notification_type == NotificationType::Exam));
    assert!(inbox
        .iter()
        .any(|notification| notification.message.contains("Hall B")));
}

#[test]
fn special_exams_need_a_matching_enrollment() {
    let world = World::new();
    let student = world.student("SCT-0001");

    let err = world
        .campus
        .student_affairs
        .apply_special_exam(
            world.actor,
            special_exam(&world, &student, SpecialExamType::MissedExam, Decimal::ZERO),
        )
        .expect_err("not enrolled");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::NotEnrolled { ref course }) if course == "C101"
    ));

    let enrollment = world.enroll(&student, world.intro.id, world.first.id);
    let err = world
        .campus
        .student_affairs
        .apply_special_exam(
            world.actor,
            special_exam(&world, &student, SpecialExamType::FailedExam, Decimal::ZERO),
        )
        .expect_err("no failing grade");
    assert_eq!(err.code(), "nothing_to_retake");

    world.grade(&enrollment, dec!(10), dec!(20));
    let retake = world
        .campus
        .student_affairs
        .apply_special_exam(
            world.actor,
            special_exam(&world, &student, SpecialExamType::FailedExam, Decimal::ZERO),
        )
        .expect("retake applied");
    assert!(!retake.fee_outstanding());

    let rejected = world
        .campus
        .student_affairs
        .decide_special_exam(world.actor, retake.id, false, "supplementary paper instead")
        .expect("rejected");
    assert_eq!(rejected.status, SpecialExamStatus::Rejected);
    assert_eq!(
        world
            .campus
            .student_affairs
            .special_exams_of(student.id)
            .expect("applications")
            .len(),
        1
    );
}

#[test]
fn approved_deferments_suspend_the_student() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let new = NewDefermentApplication {
        student: student.id,
        deferment_type: DefermentType::Medical,
        reason: "surgery and recovery".to_string(),
        requested_start_date: date(2025, 1, 6),
        requested_duration_months: 12,
    };

    let application = world
        .campus
        .student_affairs
        .apply_deferment(world.actor, new.clone())
        .expect("applied");
    assert_eq!(application.status, DefermentStatus::Pending);
    let err = world
        .campus
        .student_affairs
        .apply_deferment(world.actor, new)
        .expect_err("already open");
    assert!(matches!(
        err,
        RecordsError::Conflict {
            conflict: Conflict::OpenDefermentApplication,
            ..
        }
    ));

    let reviewing = world
        .campus
        .student_affairs
        .review_deferment(world.actor, application.id)
        .expect("under review");
    assert_eq!(reviewing.status, DefermentStatus::UnderReview);

    let approved = world
        .campus
        .student_affairs
        .decide_deferment(
            world.actor,
            application.id,
            true,
            DefermentDecision {
                start_date: Some(date(2025, 2, 3)),
                conditions: "medical report on return".to_string(),
                remarks: String::new(),
            },
        )
        .expect("approved");
    assert_eq!(approved.status, DefermentStatus::Approved);
    assert_eq!(approved.approved_start_date, Some(date(2025, 2, 3)));
    assert_eq!(approved.approved_end_date, Some(date(2026, 2, 2)));
    assert_eq!(
        world
            .campus
            .directory
            .student(student.id)
            .expect("student")
            .status,
        StudentStatus::Deferred
    );

    let err = world
        .campus
        .student_affairs
        .decide_deferment(world.actor, application.id, false, DefermentDecision::default())
        .expect_err("already decided");
    assert!(matches!(
        err,
        RecordsError::IllegalTransition {
            from: "approved",
            to: "rejected",
            ..
        }
    ));

    let err = world
        .campus
        .student_affairs
        .apply_deferment(
            world.actor,
            NewDefermentApplication {
                student: student.id,
                deferment_type: DefermentType::Financial,
                reason: "sponsor withdrew".to_string(),
                requested_start_date: date(2026, 2, 3),
                requested_duration_months: 6,
            },
        )
        .expect_err("deferred students cannot apply again");
    assert_eq!(err.code(), "student_not_active");
    assert_eq!(
        world
            .campus
            .student_affairs
            .deferments_of(student.id)
            .expect("deferments")
            .len(),
        1
    );
}
