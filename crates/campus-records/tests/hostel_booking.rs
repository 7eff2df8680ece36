mod common;

use std::thread;

use campus_records::hostel::{
    Bed, BookingAction, BookingRequest, BookingStatus, HostelPaymentMethod, HostelPaymentRequest,
    HostelPaymentStatus, HostelType, NewHostel, RoomPlan, TransitionDetails,
};
use campus_records::records_error::{ErrorKind, RecordsError};
use common::{date, World};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One hostel, two rooms of two beds each for 2024/2025.
fn beds(world: &World) -> Vec<Bed> {
    let hostel = world
        .campus
        .hostel
        .create_hostel(
            world.actor,
            NewHostel {
                name: "Kilimanjaro Hall".to_string(),
                hostel_type: HostelType::Boys,
                department: world.programme.department,
                warden: None,
                total_rooms: 2,
                description: String::new(),
                facilities: String::new(),
            },
        )
        .expect("hostel created");
    let report = world
        .campus
        .hostel
        .generate_rooms(
            world.actor,
            RoomPlan {
                hostel: hostel.id,
                academic_year: world.year.id,
                prefix: "k".to_string(),
                rooms: 2,
                rooms_per_floor: 10,
                beds_per_room: 2,
            },
        )
        .expect("rooms generated");
    assert_eq!(report.beds_created, 4);

    world
        .campus
        .context()
        .query(|tables| tables.beds.values().cloned().collect())
        .expect("readable")
}

fn booking(student: &campus_records::directory::Student, bed: &Bed) -> BookingRequest {
    BookingRequest {
        student: student.id,
        bed: bed.id,
        booking_fee: dec!(6000),
        expected_checkout_date: Some(date(2025, 4, 30)),
        remarks: String::new(),
    }
}

#[test]
fn concurrent_requests_for_one_bed_leave_exactly_one_booking() {
    let world = World::new();
    let first = world.student("SCT-0001");
    let second = world.student("SCT-0002");
    let bed = beds(&world).remove(0);

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|student| {
            let campus = world.campus.clone();
            let request = booking(&student, &bed);
            let actor = world.actor;
            thread::spawn(move || campus.hostel.create_booking(actor, request))
        })
        .collect();
    let results: Vec<Result<_, RecordsError>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("booking thread"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].status, BookingStatus::Pending);
    let loser = results
        .iter()
        .find_map(|result| result.as_ref().err())
        .expect("one request loses");
    assert_eq!(loser.code(), "bed_unavailable");
    assert_eq!(loser.kind(), ErrorKind::PreconditionFailed);

    let approved = world
        .campus
        .hostel
        .transition(
            world.actor,
            winners[0].id,
            BookingAction::Approve,
            TransitionDetails::default(),
        )
        .expect("approved");
    assert_eq!(approved.approved_by, Some(world.actor.user()));
    assert!(!world.campus.hostel.bed(bed.id).expect("bed").is_available);
}

#[test]
fn one_booking_per_student_per_academic_year() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let beds = beds(&world);

    world
        .campus
        .hostel
        .create_booking(world.actor, booking(&student, &beds[0]))
        .expect("first booking");
    let err = world
        .campus
        .hostel
        .create_booking(world.actor, booking(&student, &beds[1]))
        .expect_err("second booking in the same year");
    assert_eq!(err.code(), "duplicate_booking_for_year");
}

#[test]
fn lifecycle_frees_the_bed_on_checkout() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let bed = beds(&world).remove(0);
    let created = world
        .campus
        .hostel
        .create_booking(world.actor, booking(&student, &bed))
        .expect("booked");

    world
        .campus
        .hostel
        .transition(world.actor, created.id, BookingAction::Approve, TransitionDetails::default())
        .expect("approved");
    let checked_in = world
        .campus
        .hostel
        .transition(
            world.actor,
            created.id,
            BookingAction::CheckIn,
            TransitionDetails {
                on: Some(date(2024, 9, 11)),
                remarks: String::new(),
            },
        )
        .expect("checked in");
    assert_eq!(checked_in.check_in_date, Some(date(2024, 9, 11)));
    assert!(!world.campus.hostel.bed(bed.id).expect("bed").is_available);

    let err = world
        .campus
        .hostel
        .transition(
            world.actor,
            created.id,
            BookingAction::CheckOut,
            TransitionDetails {
                on: Some(date(2024, 9, 1)),
                remarks: String::new(),
            },
        )
        .expect_err("checkout before check-in");
    assert_eq!(err.code(), "date_order");

    let checked_out = world
        .campus
        .hostel
        .transition(
            world.actor,
            created.id,
            BookingAction::CheckOut,
            TransitionDetails {
                on: Some(date(2025, 4, 30)),
                remarks: String::new(),
            },
        )
        .expect("checked out");
    assert_eq!(checked_out.status, BookingStatus::CheckedOut);
    assert!(world.campus.hostel.bed(bed.id).expect("bed").is_available);

    let err = world
        .campus
        .hostel
        .transition(world.actor, created.id, BookingAction::Approve, TransitionDetails::default())
        .expect_err("terminal state");
    assert!(matches!(
        err,
        RecordsError::IllegalTransition {
            machine: "hostel booking",
            from: "checked_out",
            to: "approved",
        }
    ));

    let changes = world
        .campus
        .events()
        .names()
        .into_iter()
        .filter(|name| *name == "booking_state_changed")
        .count();
    assert_eq!(changes, 4);
}

#[test]
fn rejected_bookings_release_the_bed_for_others() {
    let world = World::new();
    let first = world.student("SCT-0001");
    let second = world.student("SCT-0002");
    let bed = beds(&world).remove(0);

    let created = world
        .campus
        .hostel
        .create_booking(world.actor, booking(&first, &bed))
        .expect("booked");
    let rejected = world
        .campus
        .hostel
        .transition(
            world.actor,
            created.id,
            BookingAction::Reject,
            TransitionDetails {
                on: None,
                remarks: "fees outstanding".to_string(),
            },
        )
        .expect("rejected");
    assert_eq!(rejected.approval_remarks, "fees outstanding");

    world
        .campus
        .hostel
        .create_booking(world.actor, booking(&second, &bed))
        .expect("bed free again");
}

#[test]
fn payments_move_the_booking_from_partial_to_paid() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let bed = beds(&world).remove(0);
    let created = world
        .campus
        .hostel
        .create_booking(world.actor, booking(&student, &bed))
        .expect("booked");
    assert_eq!(created.payment_status, HostelPaymentStatus::Pending);

    let pay = |amount: Decimal| HostelPaymentRequest {
        booking: created.id,
        amount,
        payment_date: date(2024, 9, 10),
        method: HostelPaymentMethod::MobileMoney,
        reference_number: String::new(),
        remarks: String::new(),
    };
    let first = world
        .campus
        .hostel
        .record_payment(world.actor, pay(dec!(2000)))
        .expect("first payment");
    assert_eq!(first.receipt_number, "HPR202400001");
    let second = world
        .campus
        .hostel
        .record_payment(world.actor, pay(dec!(4000)))
        .expect("second payment");
    assert_eq!(second.receipt_number, "HPR202400002");

    let detail = world
        .campus
        .hostel
        .booking_detail(created.id)
        .expect("detail");
    assert_eq!(detail.booking.payment_status, HostelPaymentStatus::Paid);
    assert_eq!(detail.balance_due, Decimal::ZERO);
    assert_eq!(detail.payments.len(), 2);
    assert_eq!(detail.academic_year, "2024/2025");
    assert_eq!(detail.room_number, "K001");
}

#[test]
fn room_generation_is_rerunnable_and_occupancy_counts_held_beds() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let beds = beds(&world);
    assert!(beds[0].bed_number.starts_with("KILK001"));
    assert!(beds[0].bed_number.ends_with("24"));

    let hostel = world
        .campus
        .context()
        .query(|tables| tables.hostels.values().map(|hostel| hostel.id).next())
        .expect("readable")
        .expect("hostel exists");
    let rerun = world
        .campus
        .hostel
        .generate_rooms(
            world.actor,
            RoomPlan {
                hostel,
                academic_year: world.year.id,
                prefix: "K".to_string(),
                rooms: 2,
                rooms_per_floor: 10,
                beds_per_room: 2,
            },
        )
        .expect("rerun");
    assert_eq!((rerun.rooms_created, rerun.rooms_existing, rerun.beds_created), (0, 2, 0));

    let created = world
        .campus
        .hostel
        .create_booking(world.actor, booking(&student, &beds[0]))
        .expect("booked");
    world
        .campus
        .hostel
        .transition(world.actor, created.id, BookingAction::Approve, TransitionDetails::default())
        .expect("approved");

    let report = world
        .campus
        .hostel
        .occupancy_report(world.year.id)
        .expect("occupancy");
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].total_beds, 4);
    assert_eq!(report[0].occupied_beds, 1);
    assert_eq!(report[0].rooms_with_space, 2);
}
