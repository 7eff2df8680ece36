mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use campus_records::router::{campus_router, ACTOR_HEADER};
use common::World;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(world: &World) -> Router {
    campus_router(world.campus.clone())
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, actor: Option<u64>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor.to_string());
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn enrollment_route_creates_and_rejects_duplicates() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let payload = json!({
        "student": student.id,
        "course": world.intro.id,
        "semester": world.first.id,
    });

    let (status, body) = send(
        router(&world),
        post("/api/v1/enrollments", Some(world.actor.user().0), payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["student"], json!(student.id));
    assert_eq!(body["is_active"], json!(true));

    let (status, body) = send(
        router(&world),
        post("/api/v1/enrollments", Some(world.actor.user().0), payload),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_enrollment");
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn mutations_without_an_actor_are_unprocessable() {
    let world = World::new();
    let student = world.student("SCT-0001");

    let (status, body) = send(
        router(&world),
        post(
            "/api/v1/enrollments",
            None,
            json!({
                "student": student.id,
                "course": world.intro.id,
                "semester": world.first.id,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "required");
    assert!(world
        .campus
        .enrollment
        .enrollments_of(student.id)
        .expect("readable")
        .is_empty());
}

#[tokio::test]
async fn unmet_prerequisites_map_to_precondition_failed() {
    let world = World::new();
    let student = world.student("SCT-0001");

    let (status, body) = send(
        router(&world),
        post(
            "/api/v1/enrollments",
            Some(world.actor.user().0),
            json!({
                "student": student.id,
                "course": world.data.id,
                "semester": world.second.id,
                "flags": { "force": true },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "prerequisite_unmet");
}

#[tokio::test]
async fn transcript_route_reports_graded_work() {
    let world = World::new();
    let student = world.student("SCT-0001");
    let enrollment = world.enroll(&student, world.intro.id, world.first.id);
    world.grade(&enrollment, dec!(60), dec!(70));

    let (status, body) = send(
        router(&world),
        get(&format!("/api/v1/students/{}/transcript", student.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_number"], "SCT-0001");
    assert_eq!(body["programme_code"], "BSC-CS");
    assert_eq!(body["years"].as_array().map(Vec::len), Some(1));
    assert!(!body["cumulative_gpa"].is_null());
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let world = World::new();

    let (status, body) = send(router(&world), get("/api/v1/students/999/transcript")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(router(&world), get("/api/v1/hostel/bookings/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fee_statement_route_lists_accounts() {
    let world = World::new();
    let student = world.student("SCT-0001");

    let (status, body) = send(
        router(&world),
        get(&format!("/api/v1/students/{}/fees", student.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts"], json!([]));
}

#[tokio::test]
async fn unknown_booking_transitions_are_rejected_before_lookup() {
    let world = World::new();

    let (status, body) = send(
        router(&world),
        post(
            "/api/v1/hostel/bookings/1/teleport",
            Some(world.actor.user().0),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_format");
}
