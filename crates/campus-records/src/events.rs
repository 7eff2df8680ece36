//! Domain events emitted after a unit of work commits.

use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{
    Actor, BookingId, CourseId, EnrollmentId, FeePaymentId, FeeStructureId, NotificationId,
    SemesterId, StudentId, UserId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    EnrollmentCreated {
        enrollment: EnrollmentId,
        student: StudentId,
        course: CourseId,
        semester: SemesterId,
        actor: Actor,
    },
    GradeRecorded {
        enrollment: EnrollmentId,
        letter: String,
        passed: bool,
        actor: Actor,
    },
    PaymentCompleted {
        payment: FeePaymentId,
        student: StudentId,
        fee_structure: FeeStructureId,
        amount: Decimal,
        actor: Actor,
    },
    BookingStateChanged {
        booking: BookingId,
        from: String,
        to: String,
        actor: Actor,
    },
    NotificationQueued {
        notification: NotificationId,
        recipients: Vec<UserId>,
    },
    StudentProgressed {
        student: StudentId,
        outcome: String,
        year: u8,
        semester: u8,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EnrollmentCreated { .. } => "enrollment_created",
            DomainEvent::GradeRecorded { .. } => "grade_recorded",
            DomainEvent::PaymentCompleted { .. } => "payment_completed",
            DomainEvent::BookingStateChanged { .. } => "booking_state_changed",
            DomainEvent::NotificationQueued { .. } => "notification_queued",
            DomainEvent::StudentProgressed { .. } => "student_progressed",
        }
    }
}

/// Outbound hook for committed events (message bus, mailer, audit log).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Events staged inside a unit of work; dropped when the unit rolls back.
#[derive(Debug, Default)]
pub struct Outbox {
    staged: Vec<DomainEvent>,
}

impl Outbox {
    pub fn push(&mut self, event: DomainEvent) {
        self.staged.push(event);
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub(crate) fn into_events(self) -> Vec<DomainEvent> {
        self.staged
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventLog {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }
}

impl EventPublisher for MemoryEventLog {
    fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|_| PublishError::Transport("event log poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&event)
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        tracing::info!(event = event.name(), %payload, "domain event");
        Ok(())
    }
}
