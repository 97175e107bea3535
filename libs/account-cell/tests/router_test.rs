// libs/account-cell/tests/router_test.rs

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use account_cell::router::account_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_admin_listing_requires_admin_role() {
    let config = TestConfig::default();
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));

    let response = account_routes(config.to_arc())
        .oneshot(get("/admin/users", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_can_list_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    let response = account_routes(config.to_arc())
        .oneshot(get("/admin/users?page=1&limit=8", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_notifications_of_another_user_are_forbidden() {
    let config = TestConfig::default();
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));

    let uri = format!("/users/notifications?user_id={}", Uuid::new_v4());
    let response = account_routes(config.to_arc()).oneshot(get(&uri, &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let config = TestConfig::default();
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_expired_token(&client, &config.jwt_secret);

    let response = account_routes(config.to_arc())
        .oneshot(get("/users/notifications", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_for_other_email_is_forbidden() {
    let config = TestConfig::default();
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("PUT")
        .uri("/account/password")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": "someone.else@example.com",
                "currentPassword": "Old-Harbor-71q",
                "newPassword": "Calm-Mind-42x!",
                "confirmPassword": "Calm-Mind-42x!"
            })
            .to_string(),
        ))
        .unwrap();

    let response = account_routes(config.to_arc()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
