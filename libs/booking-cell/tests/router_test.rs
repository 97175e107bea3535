// libs/booking-cell/tests/router_test.rs

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::booking_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

/// A Monday 09:00 UTC at least two days out, which the mock therapist offers.
fn upcoming_monday_nine() -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    let date = (2..9)
        .map(|offset| today + Duration::days(offset))
        .find(|d| d.weekday() == Weekday::Mon)
        .unwrap();
    date.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()).and_utc()
}

fn book_request(token: &str, therapist_id: Uuid, start: DateTime<Utc>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "therapist_id": therapist_id, "start_date_time": start.to_rfc3339() }).to_string(),
        ))
        .unwrap()
}

async fn mount_therapist(server: &MockServer, therapist_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/therapists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::therapist_response(&therapist_id.to_string(), "Meera Nair", "Couple Therapy")
        ])))
        .mount(server)
        .await;
}

#[test]
fn test_booking_requires_token() {
    let app = booking_routes(TestConfig::default().to_arc());
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = tokio_test::block_on(app.oneshot(request)).unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_book_slot_success() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));
    let therapist_id = Uuid::new_v4();
    let start = upcoming_monday_nine();

    mount_therapist(&server, therapist_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::booking_response(
                &Uuid::new_v4().to_string(),
                &therapist_id.to_string(),
                &client.id,
                &start.to_rfc3339(),
                &(start + Duration::hours(1)).to_rfc3339(),
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = booking_routes(config.to_arc())
        .oneshot(book_request(&token, therapist_id, start))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_taken_slot_is_conflict() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));
    let therapist_id = Uuid::new_v4();

    mount_therapist(&server, therapist_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("duplicate key value violates unique constraint", "23505"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let response = booking_routes(config.to_arc())
        .oneshot(book_request(&token, therapist_id, upcoming_monday_nine()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_off_schedule_start_is_not_found_without_insert() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));
    let therapist_id = Uuid::new_v4();

    mount_therapist(&server, therapist_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let tuesday = upcoming_monday_nine() + Duration::days(1);
    let response = booking_routes(config.to_arc())
        .oneshot(book_request(&token, therapist_id, tuesday))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_client_cannot_book_for_someone_else() {
    let config = TestConfig::default();
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "therapist_id": Uuid::new_v4(),
                "start_date_time": upcoming_monday_nine().to_rfc3339(),
                "client_id": Uuid::new_v4()
            })
            .to_string(),
        ))
        .unwrap();

    let response = booking_routes(config.to_arc()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
