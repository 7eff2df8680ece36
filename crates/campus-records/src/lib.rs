//! Academic records and billing core of a university system.
//!
//! Each area (directory, calendar, enrollment, grading, billing, hostel, ...) exposes a
//! service over a shared [`context::CoreContext`]. Services run their mutations as
//! units of work against the [`store::Database`] and publish [`events::DomainEvent`]s
//! once those units commit. [`campus::Campus`] bundles every service for drivers such
//! as the HTTP [`router`] and the administrative CLI.

pub mod academics;
pub mod access;
pub mod billing;
pub mod calendar;
pub mod campus;
pub mod config;
pub mod context;
pub mod directory;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod grading;
pub mod hostel;
pub mod ids;
pub mod library;
pub mod notifications;
pub mod progression;
pub mod records_error;
pub mod reporting;
pub mod router;
pub mod store;
pub mod student_affairs;
pub mod telemetry;
pub mod transcript;
mod validation;

pub use campus::Campus;
pub use records_error::{ErrorKind, RecordsError};
