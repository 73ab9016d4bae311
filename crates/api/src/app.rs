use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::messaging::Broker;
use domain::services::{AccessPolicy, NotificationSender, RoomProvider};
use persistence::repositories::DeviceRepository;
use shared::jwt::OfficeTokenVerifier;

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_office_auth, trace_id};
use crate::routes::{calls, devices, enrollment, health};
use crate::services::PresenceTracker;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub broker: Arc<Broker>,
    pub access: Arc<dyn AccessPolicy>,
    pub rooms: Arc<dyn RoomProvider>,
    pub notifier: Arc<dyn NotificationSender>,
    pub presence: PresenceTracker,
    /// None when office authentication is disabled by configuration.
    pub office_verifier: Option<Arc<OfficeTokenVerifier>>,
}

/// Capabilities injected into the router, constructed once at startup.
pub struct AppDeps {
    pub broker: Arc<Broker>,
    pub access: Arc<dyn AccessPolicy>,
    pub rooms: Arc<dyn RoomProvider>,
    pub notifier: Arc<dyn NotificationSender>,
    pub office_verifier: Option<Arc<OfficeTokenVerifier>>,
}

pub fn create_app(config: Config, pool: PgPool, deps: AppDeps) -> Router {
    let config = Arc::new(config);

    let presence = PresenceTracker::new(
        DeviceRepository::new(pool.clone()),
        config.presence.threshold_secs,
    );

    let state = AppState {
        pool,
        config: config.clone(),
        broker: deps.broker,
        access: deps.access,
        rooms: deps.rooms,
        notifier: deps.notifier,
        presence,
        office_verifier: deps.office_verifier,
    };

    // Offices are browser clients on other origins; devices talk to us
    // directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    // Office routes (require an office bearer token)
    let office_routes = Router::new()
        .route("/api/v1/devices", post(devices::create_device))
        .route("/api/v1/devices", get(devices::list_devices))
        .route("/api/v1/devices/:device_id", patch(devices::rename_device))
        .route("/api/v1/devices/:device_id", delete(devices::delete_device))
        .route(
            "/api/v1/devices/:device_id/enrollment",
            post(enrollment::begin_enrollment),
        )
        .route("/api/v1/devices/:device_id/call", post(calls::start_call))
        .route_layer(request_timeout.clone())
        // The enrollment wait stream stays open past the request timeout.
        .route(
            "/api/v1/devices/:device_id/enrollment/wait",
            get(enrollment::wait_for_enrollment),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_office_auth,
        ));

    // Device routes (authenticated per handler against the enrolled key)
    let device_routes = Router::new()
        .route(
            "/api/v1/devices/:device_id/calls/:call_id",
            get(calls::get_call_details),
        )
        .route(
            "/api/v1/devices/:device_id/notification-token",
            put(devices::update_notification_token),
        )
        .route_layer(request_timeout.clone())
        // The call wait stream stays open past the request timeout.
        .route(
            "/api/v1/devices/:device_id/calls/wait",
            get(calls::wait_for_call),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::readiness))
        .route("/api/health/live", get(health::liveness))
        .route("/api/v1/enrollment", post(enrollment::redeem_enrollment))
        .route("/metrics", get(metrics_handler))
        .route_layer(request_timeout);

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(office_routes)
        .merge(device_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
