use chrono::Datelike;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::domain::{
    bed_number, hostel_receipt, Bed, BookingAction, BookingDetail, BookingRequest, BookingStatus,
    Hostel, HostelBooking, HostelPayment, HostelPaymentRequest, HostelPaymentStatus,
    MaintenanceStatus, NewHostel, NewRoom, Occupancy, Room, RoomGenerationReport, RoomPlan,
    TransitionDetails, MAX_BED_POSITIONS,
};
use crate::context::CoreContext;
use crate::directory::{active_user, StudentStatus};
use crate::events::{DomainEvent, EventPublisher};
use crate::ids::{AcademicYearId, Actor, BedId, BookingId, HostelId, RoomId, StudentId};
use crate::records_error::{Conflict, Precondition, RecordsError};
use crate::store::{Database, Tables};
use crate::validation::{in_range, non_negative, ordered, positive_amount};

/// Hostels, rooms, per-year beds, bookings and hostel payments.
pub struct HostelService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> HostelService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn create_hostel(&self, actor: Actor, new: NewHostel) -> Result<Hostel, RecordsError> {
        new.validate()?;
        let hostel = self.ctx.commit(|tables, _| {
            crate::directory::active_department(tables, new.department)?;
            if let Some(warden) = new.warden {
                active_user(tables, warden)?;
            }
            let id = tables.hostels.insert_with(|id| Hostel {
                id,
                name: new.name.trim().to_string(),
                hostel_type: new.hostel_type,
                department: new.department,
                warden: new.warden,
                total_rooms: new.total_rooms,
                description: new.description,
                facilities: new.facilities,
                is_active: true,
            })?;
            Ok(tables.hostels.fetch(id)?.clone())
        })?;

        info!(hostel = %hostel.id, name = %hostel.name, %actor, "hostel created");
        Ok(hostel)
    }

    pub fn create_room(&self, actor: Actor, new: NewRoom) -> Result<Room, RecordsError> {
        new.validate()?;
        let room = self.ctx.commit(|tables, _| {
            active_hostel(tables, new.hostel)?;
            insert_room(tables, new)
        })?;

        info!(room = %room.id, hostel = %room.hostel, number = %room.room_number, %actor, "room created");
        Ok(room)
    }

    /// Create bed positions `1..=positions` of a room for an academic year, skipping
    /// positions that already exist.
    pub fn provision_beds(
        &self,
        actor: Actor,
        room: RoomId,
        academic_year: AcademicYearId,
        positions: u8,
    ) -> Result<Vec<Bed>, RecordsError> {
        in_range("positions", positions, 1, MAX_BED_POSITIONS)?;
        let beds = self.ctx.commit(|tables, _| {
            let created = provision(tables, room, academic_year, positions)?;
            let mut beds = Vec::with_capacity(created.len());
            for id in created {
                beds.push(tables.beds.fetch(id)?.clone());
            }
            Ok(beds)
        })?;

        info!(%room, %academic_year, created = beds.len(), %actor, "beds provisioned");
        Ok(beds)
    }

    /// Get-or-create the rooms of a plan and provision their beds for the year.
    pub fn generate_rooms(
        &self,
        actor: Actor,
        plan: RoomPlan,
    ) -> Result<RoomGenerationReport, RecordsError> {
        plan.validate()?;
        let report = self.ctx.commit(|tables, _| {
            active_hostel(tables, plan.hostel)?;
            tables.academic_years.fetch(plan.academic_year)?;

            let mut report = RoomGenerationReport::default();
            for index in 1..=plan.rooms {
                let number = plan.room_number(index);
                let existing = tables
                    .rooms
                    .find(|room| room.hostel == plan.hostel && room.room_number == number)
                    .map(|room| room.id);
                let room = match existing {
                    Some(room) => {
                        report.rooms_existing += 1;
                        room
                    }
                    None => {
                        report.rooms_created += 1;
                        insert_room(
                            tables,
                            NewRoom {
                                hostel: plan.hostel,
                                room_number: number.clone(),
                                floor: plan.floor(index),
                                capacity: plan.beds_per_room,
                                description: format!("Room {number}"),
                            },
                        )?
                        .id
                    }
                };
                report.beds_created +=
                    provision(tables, room, plan.academic_year, plan.beds_per_room)?.len();
            }
            Ok(report)
        })?;

        info!(
            hostel = %plan.hostel,
            rooms_created = report.rooms_created,
            rooms_existing = report.rooms_existing,
            beds_created = report.beds_created,
            %actor,
            "hostel rooms generated"
        );
        Ok(report)
    }

    /// Reserve a bed for the academic year the bed belongs to. The writer lock is held
    /// while availability is inspected, so concurrent requests for one bed serialise
    /// and the later one sees the bed taken.
    pub fn create_booking(
        &self,
        actor: Actor,
        request: BookingRequest,
    ) -> Result<HostelBooking, RecordsError> {
        non_negative("booking_fee", request.booking_fee)?;
        let booked_at = self.ctx.now();

        let booking = self.ctx.commit(|tables, outbox| {
            let student = tables.students.fetch(request.student)?;
            if student.status != StudentStatus::Active {
                return Err(Precondition::StudentNotActive {
                    student: student.student_number.clone(),
                    status: student.status.label(),
                }
                .into());
            }

            let bed = tables.beds.fetch(request.bed)?.clone();
            let room = tables.rooms.fetch(bed.room)?;
            if !room.is_active {
                return Err(RecordsError::inactive("room", &room.room_number));
            }
            active_hostel(tables, room.hostel)?;

            let already_booked = tables
                .bookings
                .find(|row| row.student == request.student && row.academic_year == bed.academic_year)
                .is_some();
            if already_booked {
                return Err(RecordsError::Conflict {
                    conflict: Conflict::DuplicateBookingForYear,
                    key: format!("{}:{}", student.student_number, bed.academic_year),
                });
            }

            let bed_taken = tables
                .bookings
                .find(|row| row.bed == bed.id && !row.status.is_terminal())
                .is_some();
            if bed_taken || !bed.is_available || bed.maintenance != MaintenanceStatus::Good {
                return Err(Precondition::BedUnavailable {
                    bed: bed.bed_number.clone(),
                }
                .into());
            }

            let id = tables.bookings.insert_with(|id| HostelBooking {
                id,
                student: request.student,
                bed: bed.id,
                academic_year: bed.academic_year,
                booked_at,
                status: BookingStatus::Pending,
                payment_status: HostelPaymentStatus::classify(Decimal::ZERO, request.booking_fee),
                booking_fee: request.booking_fee,
                amount_paid: Decimal::ZERO,
                expected_checkout_date: request.expected_checkout_date,
                check_in_date: None,
                check_out_date: None,
                approved_by: None,
                approval_date: None,
                approval_remarks: String::new(),
                checked_in_by: None,
                checked_out_by: None,
                remarks: request.remarks,
            })?;

            outbox.push(DomainEvent::BookingStateChanged {
                booking: id,
                from: "new".to_string(),
                to: BookingStatus::Pending.label().to_string(),
                actor,
            });
            Ok(tables.bookings.fetch(id)?.clone())
        })?;

        info!(
            booking = %booking.id,
            student = %booking.student,
            bed = %booking.bed,
            %actor,
            "hostel booking created"
        );
        Ok(booking)
    }

    /// Apply a lifecycle action and keep the bed's availability flag in step.
    pub fn transition(
        &self,
        actor: Actor,
        booking: BookingId,
        action: BookingAction,
        details: TransitionDetails,
    ) -> Result<HostelBooking, RecordsError> {
        let now = self.ctx.now();
        let today = self.ctx.today();

        let (from, updated) = self.ctx.commit(|tables, outbox| {
            let current = tables.bookings.fetch(booking)?.clone();
            let next = current.status.apply(action)?;
            let on = details.on.unwrap_or(today);

            let mut row = current.clone();
            row.status = next;
            match action {
                BookingAction::Approve | BookingAction::Reject => {
                    row.approved_by = Some(actor.user());
                    row.approval_date = Some(now);
                    row.approval_remarks = details.remarks;
                }
                BookingAction::CheckIn => {
                    if let Some(expected) = row.expected_checkout_date {
                        ordered("check_in_date", on, "expected_checkout_date", expected)?;
                    }
                    row.check_in_date = Some(on);
                    row.checked_in_by = Some(actor.user());
                }
                BookingAction::CheckOut => {
                    if let Some(checked_in) = row.check_in_date {
                        ordered("check_in_date", checked_in, "check_out_date", on)?;
                    }
                    row.check_out_date = Some(on);
                    row.checked_out_by = Some(actor.user());
                }
                BookingAction::Cancel => {
                    if !details.remarks.is_empty() {
                        row.remarks = details.remarks;
                    }
                }
            }
            tables.bookings.replace(booking, row)?;

            if next.holds_bed() {
                tables.beds.update(current.bed, |bed| bed.is_available = false)?;
            } else if next.is_terminal() {
                tables.beds.update(current.bed, |bed| bed.is_available = true)?;
            }

            outbox.push(DomainEvent::BookingStateChanged {
                booking,
                from: current.status.label().to_string(),
                to: next.label().to_string(),
                actor,
            });
            Ok((current.status, tables.bookings.fetch(booking)?.clone()))
        })?;

        info!(%booking, from = %from, to = %updated.status, %actor, "hostel booking transitioned");
        Ok(updated)
    }

    /// Record a hostel payment with a generated receipt and recompute the booking's
    /// paid amount and payment status.
    pub fn record_payment(
        &self,
        actor: Actor,
        request: HostelPaymentRequest,
    ) -> Result<HostelPayment, RecordsError> {
        positive_amount(request.amount)?;

        let payment = self.ctx.commit(|tables, _| {
            tables.bookings.fetch(request.booking)?;
            let year = request.payment_date.year();
            let prefix = format!("HPR{year}");
            let sequence = tables
                .hostel_payments
                .filter(|row| row.receipt_number.starts_with(&prefix))
                .count()
                + 1;

            let id = tables.hostel_payments.insert_with(|id| HostelPayment {
                id,
                booking: request.booking,
                amount: request.amount,
                payment_date: request.payment_date,
                method: request.method,
                reference_number: request.reference_number,
                receipt_number: hostel_receipt(year, sequence),
                received_by: Some(actor.user()),
                remarks: request.remarks,
            })?;
            refresh_booking_payments(tables, request.booking)?;
            Ok(tables.hostel_payments.fetch(id)?.clone())
        })?;

        info!(
            payment = %payment.id,
            booking = %payment.booking,
            receipt = %payment.receipt_number,
            amount = %payment.amount,
            %actor,
            "hostel payment recorded"
        );
        Ok(payment)
    }

    pub fn booking(&self, booking: BookingId) -> Result<HostelBooking, RecordsError> {
        self.ctx
            .lookup(|tables| Ok(tables.bookings.fetch(booking)?.clone()))
    }

    pub fn booking_detail(&self, booking: BookingId) -> Result<BookingDetail, RecordsError> {
        debug!(%booking, "reading booking detail");
        self.ctx.lookup(|tables| {
            let row = tables.bookings.fetch(booking)?;
            let student = tables.students.fetch(row.student)?;
            let bed = tables.beds.fetch(row.bed)?;
            let room = tables.rooms.fetch(bed.room)?;
            let hostel = tables.hostels.fetch(room.hostel)?;
            let year = tables.academic_years.fetch(row.academic_year)?;
            Ok(BookingDetail {
                booking: row.clone(),
                student_number: student.student_number.clone(),
                hostel: hostel.name.clone(),
                room_number: room.room_number.clone(),
                bed_number: bed.bed_number.clone(),
                academic_year: year.label.clone(),
                balance_due: row.balance_due(),
                payments: tables
                    .hostel_payments
                    .filter(|payment| payment.booking == booking)
                    .cloned()
                    .collect(),
            })
        })
    }

    pub fn bookings_of(&self, student: StudentId) -> Result<Vec<HostelBooking>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.students.fetch(student)?;
            Ok(tables
                .bookings
                .filter(|row| row.student == student)
                .cloned()
                .collect())
        })
    }

    pub fn bed(&self, bed: BedId) -> Result<Bed, RecordsError> {
        self.ctx.lookup(|tables| Ok(tables.beds.fetch(bed)?.clone()))
    }

    pub fn occupancy(
        &self,
        hostel: HostelId,
        academic_year: AcademicYearId,
    ) -> Result<Occupancy, RecordsError> {
        self.ctx
            .lookup(|tables| occupancy_of(tables, hostel, academic_year))
    }

    /// Occupancy of every active hostel for an academic year.
    pub fn occupancy_report(
        &self,
        academic_year: AcademicYearId,
    ) -> Result<Vec<Occupancy>, RecordsError> {
        self.ctx.lookup(|tables| {
            tables.academic_years.fetch(academic_year)?;
            tables
                .hostels
                .filter(|hostel| hostel.is_active)
                .map(|hostel| occupancy_of(tables, hostel.id, academic_year))
                .collect()
        })
    }
}

fn active_hostel(tables: &Tables, hostel: HostelId) -> Result<&Hostel, RecordsError> {
    let row = tables.hostels.fetch(hostel)?;
    if !row.is_active {
        return Err(RecordsError::inactive("hostel", &row.name));
    }
    Ok(row)
}

fn insert_room(tables: &mut Tables, new: NewRoom) -> Result<Room, RecordsError> {
    let id = tables.rooms.insert_with(|id| Room {
        id,
        hostel: new.hostel,
        room_number: new.room_number.trim().to_ascii_uppercase(),
        floor: new.floor,
        capacity: new.capacity,
        description: new.description,
        is_active: true,
    })?;
    Ok(tables.rooms.fetch(id)?.clone())
}

fn provision(
    tables: &mut Tables,
    room: RoomId,
    academic_year: AcademicYearId,
    positions: u8,
) -> Result<Vec<BedId>, RecordsError> {
    let room_row = tables.rooms.fetch(room)?;
    let prefix = tables.hostels.fetch(room_row.hostel)?.bed_prefix();
    let room_number = room_row.room_number.clone();
    let start_year = tables.academic_years.fetch(academic_year)?.start_year();

    let mut created = Vec::new();
    for position in 1..=positions {
        let exists = tables
            .beds
            .find(|bed| {
                bed.room == room && bed.academic_year == academic_year && bed.position == position
            })
            .is_some();
        if exists {
            continue;
        }
        created.push(tables.beds.insert_with(|id| Bed {
            id,
            room,
            academic_year,
            position,
            bed_number: bed_number(&prefix, &room_number, position, start_year),
            is_available: true,
            maintenance: MaintenanceStatus::Good,
        })?);
    }
    Ok(created)
}

fn refresh_booking_payments(tables: &mut Tables, booking: BookingId) -> Result<(), RecordsError> {
    let paid: Decimal = tables
        .hostel_payments
        .filter(|payment| payment.booking == booking)
        .map(|payment| payment.amount)
        .sum();
    tables.bookings.update(booking, |row| {
        row.amount_paid = paid;
        row.payment_status = HostelPaymentStatus::classify(paid, row.booking_fee);
    })?;
    Ok(())
}

fn occupancy_of(
    tables: &Tables,
    hostel: HostelId,
    academic_year: AcademicYearId,
) -> Result<Occupancy, RecordsError> {
    let row = tables.hostels.fetch(hostel)?;
    let mut occupancy = Occupancy {
        hostel,
        name: row.name.clone(),
        academic_year,
        total_beds: 0,
        occupied_beds: 0,
        rooms_with_space: 0,
    };
    for room in tables
        .rooms
        .filter(|room| room.hostel == hostel && room.is_active)
    {
        let mut has_space = false;
        for bed in tables
            .beds
            .filter(|bed| bed.room == room.id && bed.academic_year == academic_year)
        {
            occupancy.total_beds += 1;
            if bed.is_available {
                has_space = true;
            } else {
                occupancy.occupied_beds += 1;
            }
        }
        if has_space {
            occupancy.rooms_with_space += 1;
        }
    }
    Ok(occupancy)
}
