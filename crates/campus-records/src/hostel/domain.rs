use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{
    AcademicYearId, BedId, BookingId, DepartmentId, HostelId, HostelPaymentId, RoomId, StudentId,
    UserId,
};
use crate::records_error::{Conflict, RecordsError, Violation};
use crate::store::{Constrained, UniqueKey};
use crate::validation::{in_range, required};

pub const MAX_BED_POSITIONS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostelType {
    Boys,
    Girls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHostel {
    pub name: String,
    pub hostel_type: HostelType,
    pub department: DepartmentId,
    #[serde(default)]
    pub warden: Option<UserId>,
    pub total_rooms: u16,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub facilities: String,
}

impl NewHostel {
    pub fn validate(&self) -> Result<(), Violation> {
        required("name", &self.name)?;
        if self.name.trim().chars().filter(|ch| ch.is_alphanumeric()).count() < 3 {
            return Err(Violation::InvalidFormat {
                field: "name",
                value: self.name.clone(),
            });
        }
        in_range("total_rooms", self.total_rooms, 1, u16::MAX)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hostel {
    pub id: HostelId,
    pub name: String,
    pub hostel_type: HostelType,
    pub department: DepartmentId,
    pub warden: Option<UserId>,
    pub total_rooms: u16,
    pub description: String,
    pub facilities: String,
    pub is_active: bool,
}

impl Hostel {
    /// First three letters of the name, upper-cased; prefixes every bed number.
    pub fn bed_prefix(&self) -> String {
        self.name
            .trim()
            .chars()
            .filter(|ch| ch.is_alphanumeric())
            .take(3)
            .collect::<String>()
            .to_uppercase()
    }
}

impl Constrained for Hostel {
    const ENTITY: &'static str = "hostel";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub hostel: HostelId,
    pub room_number: String,
    pub floor: u8,
    pub capacity: u8,
    #[serde(default)]
    pub description: String,
}

impl NewRoom {
    pub fn validate(&self) -> Result<(), Violation> {
        required("room_number", &self.room_number)?;
        in_range("capacity", self.capacity, 1, 8)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub hostel: HostelId,
    pub room_number: String,
    pub floor: u8,
    pub capacity: u8,
    pub description: String,
    pub is_active: bool,
}

impl Constrained for Room {
    const ENTITY: &'static str = "room";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateRoom,
            format!("{}:{}", self.hostel, self.room_number),
        )]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    #[default]
    Good,
    NeedsRepair,
    UnderMaintenance,
    OutOfOrder,
}

/// A bed position in a room for one academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub id: BedId,
    pub room: RoomId,
    pub academic_year: AcademicYearId,
    pub position: u8,
    pub bed_number: String,
    pub is_available: bool,
    pub maintenance: MaintenanceStatus,
}

impl Constrained for Bed {
    const ENTITY: &'static str = "bed";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateBed,
            format!("{}:{}:{}", self.room, self.academic_year, self.position),
        )]
    }
}

/// `<hostel-prefix-3><room-number><position-digit><YY>`
pub fn bed_number(hostel_prefix: &str, room_number: &str, position: u8, start_year: i32) -> String {
    format!(
        "{hostel_prefix}{room_number}{position}{:02}",
        start_year.rem_euclid(100)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    CheckedIn,
    CheckedOut,
}

impl BookingStatus {
    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::CheckedOut
        )
    }

    /// States in which the bed is marked unavailable.
    pub fn holds_bed(self) -> bool {
        matches!(self, BookingStatus::Approved | BookingStatus::CheckedIn)
    }

    pub fn apply(self, action: BookingAction) -> Result<BookingStatus, RecordsError> {
        let next = match (self, action) {
            (BookingStatus::Pending, BookingAction::Approve) => BookingStatus::Approved,
            (BookingStatus::Pending, BookingAction::Reject) => BookingStatus::Rejected,
            (BookingStatus::Approved, BookingAction::Cancel) => BookingStatus::Cancelled,
            (BookingStatus::Approved, BookingAction::CheckIn) => BookingStatus::CheckedIn,
            (BookingStatus::CheckedIn, BookingAction::CheckOut) => BookingStatus::CheckedOut,
            (from, action) => {
                return Err(RecordsError::transition(
                    "hostel booking",
                    from.label(),
                    action.target().label(),
                ))
            }
        };
        Ok(next)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Approve,
    Reject,
    Cancel,
    CheckIn,
    CheckOut,
}

impl BookingAction {
    pub fn target(self) -> BookingStatus {
        match self {
            BookingAction::Approve => BookingStatus::Approved,
            BookingAction::Reject => BookingStatus::Rejected,
            BookingAction::Cancel => BookingStatus::Cancelled,
            BookingAction::CheckIn => BookingStatus::CheckedIn,
            BookingAction::CheckOut => BookingStatus::CheckedOut,
        }
    }

    /// Path segment form used by the HTTP surface (`approve`, `check-in`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let action = match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "approve" => BookingAction::Approve,
            "reject" => BookingAction::Reject,
            "cancel" => BookingAction::Cancel,
            "check_in" | "checkin" => BookingAction::CheckIn,
            "check_out" | "checkout" => BookingAction::CheckOut,
            _ => return None,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostelPaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
}

impl HostelPaymentStatus {
    pub fn classify(amount_paid: Decimal, booking_fee: Decimal) -> Self {
        if amount_paid >= booking_fee {
            HostelPaymentStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            HostelPaymentStatus::Partial
        } else {
            HostelPaymentStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostelBooking {
    pub id: BookingId,
    pub student: StudentId,
    pub bed: BedId,
    pub academic_year: AcademicYearId,
    pub booked_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: HostelPaymentStatus,
    pub booking_fee: Decimal,
    pub amount_paid: Decimal,
    pub expected_checkout_date: Option<NaiveDate>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub approved_by: Option<UserId>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approval_remarks: String,
    pub checked_in_by: Option<UserId>,
    pub checked_out_by: Option<UserId>,
    pub remarks: String,
}

impl HostelBooking {
    pub fn balance_due(&self) -> Decimal {
        self.booking_fee - self.amount_paid
    }
}

impl Constrained for HostelBooking {
    const ENTITY: &'static str = "hostel booking";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new(
            Conflict::DuplicateBookingForYear,
            format!("{}:{}", self.student, self.academic_year),
        )];
        if !self.status.is_terminal() {
            keys.push(UniqueKey::new(Conflict::BedOccupied, format!("bed:{}", self.bed)));
        }
        keys
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub student: StudentId,
    pub bed: BedId,
    #[serde(default)]
    pub booking_fee: Decimal,
    #[serde(default)]
    pub expected_checkout_date: Option<NaiveDate>,
    #[serde(default)]
    pub remarks: String,
}

/// Transition request; `on` is the check-in or check-out date where relevant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionDetails {
    #[serde(default)]
    pub on: Option<NaiveDate>,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostelPaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
    Cheque,
    Card,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostelPayment {
    pub id: HostelPaymentId,
    pub booking: BookingId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: HostelPaymentMethod,
    pub reference_number: String,
    pub receipt_number: String,
    pub received_by: Option<UserId>,
    pub remarks: String,
}

impl Constrained for HostelPayment {
    const ENTITY: &'static str = "hostel payment";

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            Conflict::DuplicateReceipt,
            self.receipt_number.clone(),
        )]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostelPaymentRequest {
    pub booking: BookingId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: HostelPaymentMethod,
    #[serde(default)]
    pub reference_number: String,
    #[serde(default)]
    pub remarks: String,
}

/// `HPR<YYYY><5-digit sequence within the year>`
pub fn hostel_receipt(year: i32, sequence: usize) -> String {
    format!("HPR{year}{sequence:05}")
}

/// Booking with its bed, room and payments resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingDetail {
    pub booking: HostelBooking,
    pub student_number: String,
    pub hostel: String,
    pub room_number: String,
    pub bed_number: String,
    pub academic_year: String,
    pub balance_due: Decimal,
    pub payments: Vec<HostelPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub hostel: HostelId,
    pub name: String,
    pub academic_year: AcademicYearId,
    pub total_beds: usize,
    pub occupied_beds: usize,
    pub rooms_with_space: usize,
}

/// Rooms `<prefix><NNN>` numbered from 1, `rooms_per_floor` to a floor, each with
/// `beds_per_room` bed positions for the academic year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPlan {
    pub hostel: HostelId,
    pub academic_year: AcademicYearId,
    pub prefix: String,
    pub rooms: u16,
    pub rooms_per_floor: u16,
    pub beds_per_room: u8,
}

impl RoomPlan {
    pub fn validate(&self) -> Result<(), Violation> {
        required("prefix", &self.prefix)?;
        in_range("rooms", self.rooms, 1, 999)?;
        in_range("rooms_per_floor", self.rooms_per_floor, 1, 999)?;
        in_range("beds_per_room", self.beds_per_room, 1, MAX_BED_POSITIONS)?;
        Ok(())
    }

    pub fn room_number(&self, index: u16) -> String {
        format!("{}{index:03}", self.prefix.trim().to_ascii_uppercase())
    }

    pub fn floor(&self, index: u16) -> u8 {
        u8::try_from((index - 1) / self.rooms_per_floor + 1).unwrap_or(u8::MAX)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoomGenerationReport {
    pub rooms_created: usize,
    pub rooms_existing: usize,
    pub beds_created: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bed_numbers_join_prefix_room_position_and_year() {
        assert_eq!(bed_number("MTK", "MTK001", 3, 2024), "MTKMTK001324");
        assert_eq!(bed_number("ELG", "12", 1, 2009), "ELG12109");
    }

    #[test]
    fn booking_lifecycle_only_moves_forward() {
        let approved = BookingStatus::Pending
            .apply(BookingAction::Approve)
            .expect("approve pending");
        let checked_in = approved.apply(BookingAction::CheckIn).expect("check in");
        let checked_out = checked_in.apply(BookingAction::CheckOut).expect("check out");
        assert!(checked_out.is_terminal());

        assert!(matches!(
            BookingStatus::Pending.apply(BookingAction::CheckIn),
            Err(RecordsError::IllegalTransition {
                from: "pending",
                to: "checked_in",
                ..
            })
        ));
        assert!(BookingStatus::CheckedIn.apply(BookingAction::Cancel).is_err());
        assert!(BookingStatus::Rejected.apply(BookingAction::Approve).is_err());
    }

    #[test]
    fn only_approved_and_checked_in_hold_the_bed() {
        assert!(BookingStatus::Approved.holds_bed());
        assert!(BookingStatus::CheckedIn.holds_bed());
        assert!(!BookingStatus::Pending.holds_bed());
        assert!(!BookingStatus::CheckedOut.holds_bed());
    }

    #[test]
    fn actions_parse_from_path_segments() {
        assert_eq!(BookingAction::parse("check-in"), Some(BookingAction::CheckIn));
        assert_eq!(BookingAction::parse("Approve"), Some(BookingAction::Approve));
        assert_eq!(BookingAction::parse("evict"), None);
    }

    #[test]
    fn hostel_receipts_are_zero_padded() {
        assert_eq!(hostel_receipt(2025, 7), "HPR202500007");
    }

    #[test]
    fn room_plan_numbers_rooms_by_floor() {
        let plan = RoomPlan {
            hostel: HostelId(1),
            academic_year: AcademicYearId(1),
            prefix: "mtk".to_string(),
            rooms: 80,
            rooms_per_floor: 40,
            beds_per_room: 4,
        };
        assert_eq!(plan.room_number(7), "MTK007");
        assert_eq!(plan.floor(40), 1);
        assert_eq!(plan.floor(41), 2);
    }
}
