//! Hostels, rooms, per-year beds, bookings and hostel payments.

pub mod domain;
mod service;

pub use domain::{
    bed_number, hostel_receipt, Bed, BookingAction, BookingDetail, BookingRequest, BookingStatus,
    Hostel, HostelBooking, HostelPayment, HostelPaymentMethod, HostelPaymentRequest,
    HostelPaymentStatus, HostelType, MaintenanceStatus, NewHostel, NewRoom, Occupancy, Room,
    RoomGenerationReport, RoomPlan, TransitionDetails, MAX_BED_POSITIONS,
};
pub use service::HostelService;
