//! Router-level tests that exercise authentication, validation and probe
//! behavior without a live database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use carecall_api::app::{create_app, AppDeps};
use carecall_api::config::Config;
use carecall_api::services::notifications::LogNotificationSender;
use carecall_api::services::{AllowAllPolicy, TenantMembershipPolicy, VideoRoomService};
use domain::messaging::{Broker, BrokerOptions};
use persistence::repositories::TenantRepository;
use shared::jwt::OfficeTokenVerifier;

const TEST_PRIVATE_KEY: &str = include_str!("../../shared/src/testdata/test_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../../shared/src/testdata/test_key.pub.pem");

fn test_config() -> Config {
    Config::load_for_test(&[
        ("database.url", "postgres://localhost:5432/carecall_test"),
        ("rooms.private_key", TEST_PRIVATE_KEY),
    ])
    .expect("Failed to load test config")
}

fn test_app(verify_office_tokens: bool) -> axum::Router {
    let config = test_config();
    // Lazy pool: connections are only attempted when a query runs.
    let pool = sqlx::PgPool::connect_lazy(&config.database.url).unwrap();

    let office_verifier = verify_office_tokens.then(|| {
        Arc::new(
            OfficeTokenVerifier::new(TEST_PUBLIC_KEY, "https://idp.test/", "carecall").unwrap(),
        )
    });
    let access: Arc<dyn domain::services::AccessPolicy> = if verify_office_tokens {
        Arc::new(TenantMembershipPolicy::new(TenantRepository::new(
            pool.clone(),
        )))
    } else {
        Arc::new(AllowAllPolicy)
    };

    create_app(
        config.clone(),
        pool,
        AppDeps {
            broker: Arc::new(Broker::new(BrokerOptions::default())),
            access,
            rooms: Arc::new(VideoRoomService::new(&config.rooms).unwrap()),
            notifier: Arc::new(LogNotificationSender),
            office_verifier,
        },
    )
}

#[tokio::test]
async fn liveness_answers_without_database() {
    let app = test_app(false);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_fails_before_broker_and_database_are_up() {
    let app = test_app(false);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn office_routes_reject_missing_bearer() {
    let app = test_app(true);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/devices")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn office_routes_reject_garbage_bearer() {
    let app = test_app(true);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/devices")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn device_routes_reject_missing_bearer() {
    let app = test_app(false);
    let device_id = uuid::Uuid::new_v4();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/devices/{device_id}/calls/wait"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn redeem_rejects_empty_enrollment_key() {
    let app = test_app(false);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/enrollment")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"enrollmentKey":"","publicKey":"-----BEGIN PUBLIC KEY-----"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
