//! HTTP surface over the read and write APIs. Every mutation is attributed to the
//! user named in the `x-actor-id` header.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::billing::{FeePayment, FeeStatement, PaymentRequest};
use crate::campus::Campus;
use crate::directory::StudentListing;
use crate::enrollment::{Enrollment, EnrollmentRequest};
use crate::error::AppError;
use crate::events::EventPublisher;
use crate::grading::{Grade, GradeEntry};
use crate::hostel::{BookingAction, BookingDetail, BookingRequest, HostelBooking, TransitionDetails};
use crate::ids::{Actor, BookingId, ProgrammeId, StudentId, UserId};
use crate::records_error::{RecordsError, Violation};
use crate::store::Database;
use crate::transcript::Transcript;

pub const ACTOR_HEADER: &str = "x-actor-id";

type Shared<D, E> = State<Arc<Campus<D, E>>>;

pub fn campus_router<D, E>(campus: Arc<Campus<D, E>>) -> Router
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/students/:student_id/transcript",
            get(transcript_handler::<D, E>),
        )
        .route(
            "/api/v1/students/:student_id/fees",
            get(fee_statement_handler::<D, E>),
        )
        .route(
            "/api/v1/programmes/:programme_id/students",
            get(programme_students_handler::<D, E>),
        )
        .route("/api/v1/enrollments", post(enroll_handler::<D, E>))
        .route("/api/v1/grades", post(grade_handler::<D, E>))
        .route("/api/v1/fees/payments", post(payment_handler::<D, E>))
        .route("/api/v1/hostel/bookings", post(booking_handler::<D, E>))
        .route(
            "/api/v1/hostel/bookings/:booking_id",
            get(booking_detail_handler::<D, E>),
        )
        .route(
            "/api/v1/hostel/bookings/:booking_id/:transition",
            post(booking_transition_handler::<D, E>),
        )
        .with_state(campus)
}

pub(crate) fn actor_from(headers: &HeaderMap) -> Result<Actor, RecordsError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or(Violation::Required {
            field: ACTOR_HEADER,
        })?
        .to_str()
        .map_err(|_| Violation::InvalidFormat {
            field: ACTOR_HEADER,
            value: String::from("<non-ascii>"),
        })?;
    let id = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Violation::InvalidFormat {
            field: ACTOR_HEADER,
            value: raw.to_string(),
        })?;
    Ok(Actor(UserId(id)))
}

pub(crate) async fn transcript_handler<D, E>(
    State(campus): Shared<D, E>,
    Path(student): Path<StudentId>,
) -> Result<Json<Transcript>, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    Ok(Json(campus.transcript.transcript(student)?))
}

pub(crate) async fn fee_statement_handler<D, E>(
    State(campus): Shared<D, E>,
    Path(student): Path<StudentId>,
) -> Result<Json<FeeStatement>, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    Ok(Json(campus.billing.statement(student)?))
}

pub(crate) async fn programme_students_handler<D, E>(
    State(campus): Shared<D, E>,
    Path(programme): Path<ProgrammeId>,
) -> Result<Json<Vec<StudentListing>>, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    Ok(Json(campus.directory.students_by_programme(programme)?))
}

pub(crate) async fn booking_detail_handler<D, E>(
    State(campus): Shared<D, E>,
    Path(booking): Path<BookingId>,
) -> Result<Json<BookingDetail>, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    Ok(Json(campus.hostel.booking_detail(booking)?))
}

pub(crate) async fn enroll_handler<D, E>(
    State(campus): Shared<D, E>,
    headers: HeaderMap,
    Json(request): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    let actor = actor_from(&headers)?;
    let enrollment = campus.enrollment.enroll(actor, request)?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub(crate) async fn grade_handler<D, E>(
    State(campus): Shared<D, E>,
    headers: HeaderMap,
    Json(entry): Json<GradeEntry>,
) -> Result<Json<Grade>, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    let actor = actor_from(&headers)?;
    Ok(Json(campus.grading.record_grade(actor, entry)?))
}

pub(crate) async fn payment_handler<D, E>(
    State(campus): Shared<D, E>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<FeePayment>), AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    let actor = actor_from(&headers)?;
    let payment = campus.billing.record_payment(actor, request)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub(crate) async fn booking_handler<D, E>(
    State(campus): Shared<D, E>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<HostelBooking>), AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    let actor = actor_from(&headers)?;
    let booking = campus.hostel.create_booking(actor, request)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// `:transition` is one of approve, reject, cancel, check-in, check-out. The body
/// is optional and carries the date and remarks.
pub(crate) async fn booking_transition_handler<D, E>(
    State(campus): Shared<D, E>,
    headers: HeaderMap,
    Path((booking, transition)): Path<(BookingId, String)>,
    body: Option<Json<TransitionDetails>>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    let actor = actor_from(&headers)?;
    let action = BookingAction::parse(&transition).ok_or_else(|| {
        RecordsError::from(Violation::InvalidFormat {
            field: "transition",
            value: transition.clone(),
        })
    })?;
    let details = body.map(|Json(details)| details).unwrap_or_default();
    let updated = campus.hostel.transition(actor, booking, action, details)?;
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_header_is_required_and_numeric() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            actor_from(&headers),
            Err(RecordsError::Validation(Violation::Required { .. }))
        ));

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("registrar"));
        assert!(matches!(
            actor_from(&headers),
            Err(RecordsError::Validation(Violation::InvalidFormat { .. }))
        ));

        headers.insert(ACTOR_HEADER, HeaderValue::from_static(" 42 "));
        assert_eq!(actor_from(&headers).expect("numeric actor"), Actor(UserId(42)));
    }
}
