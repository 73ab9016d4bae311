//! Enrollment handshake endpoints.
//!
//! The office issues a one-time enrollment key out of band, the device
//! redeems it with a freshly generated public key, and the office can hold
//! an event stream open to hear about the completion.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use validator::Validate;

use domain::messaging::EnrollmentAnnouncement;
use domain::models::{
    BeginEnrollmentResponse, Device, DeviceResponse, RedeemEnrollmentRequest,
    RedeemEnrollmentResponse,
};
use persistence::repositories::{DeviceRepository, EnrollmentRepository};
use shared::crypto::{self, ENROLLMENT_KEY_LENGTH};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{metrics, OfficeAuth};
use crate::routes::devices::find_device;

/// Issues a fresh enrollment ticket for a not-yet-enrolled device.
///
/// Any previous unredeemed key stops working; exactly one ticket is live
/// per device.
pub async fn begin_enrollment(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<BeginEnrollmentResponse>, ApiError> {
    let devices = DeviceRepository::new(state.pool.clone());
    let device = find_device(&devices, device_id).await?;
    state
        .access
        .can_access_device(&auth.subject, device_id, true)
        .await?;

    if device.is_enrolled() {
        return Err(ApiError::FailedPrecondition(
            "Device is already enrolled".to_string(),
        ));
    }

    let enrollment_key = crypto::random_key(ENROLLMENT_KEY_LENGTH);
    let key_hash = crypto::sha256_hex(&enrollment_key);

    // Keep the settings from the superseded ticket when one exists.
    let enrollments = EnrollmentRepository::new(state.pool.clone());
    let settings = enrollments
        .find_by_device(device_id)
        .await?
        .map(|ticket| ticket.device_settings)
        .unwrap_or_else(|| serde_json::json!({}));
    enrollments
        .replace_ticket(device_id, &key_hash, &settings)
        .await?;

    tracing::info!(%device_id, "Enrollment ticket issued");

    Ok(Json(BeginEnrollmentResponse {
        device_id,
        enrollment_key,
    }))
}

/// Redeems an enrollment key, binding the submitted public key to the
/// device. Unknown, already-used and already-enrolled keys are
/// indistinguishable from the outside.
pub async fn redeem_enrollment(
    State(state): State<AppState>,
    Json(request): Json<RedeemEnrollmentRequest>,
) -> Result<Json<RedeemEnrollmentResponse>, ApiError> {
    request.validate()?;
    shared::jwt::validate_rsa_public_key(&request.public_key)
        .map_err(|_| ApiError::InvalidArgument("Public key must be an RSA key in PEM format".to_string()))?;

    let key_hash = crypto::sha256_hex(&request.enrollment_key);
    let redeemed = EnrollmentRepository::new(state.pool.clone())
        .redeem(&key_hash, &request.public_key)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid enrollment key".to_string()))?;

    metrics::record_enrollment_completed();
    tracing::info!(device_id = %redeemed.device_id, "Device enrolled");

    // Enrollment is durable at this point; a failed announcement only
    // delays the office until it polls.
    if let Err(e) = state.broker.publish_enrollment(redeemed.device_id).await {
        tracing::warn!(
            device_id = %redeemed.device_id,
            "Failed to announce enrollment: {}", e
        );
    }

    Ok(Json(RedeemEnrollmentResponse {
        device_id: redeemed.device_id,
        settings: redeemed.device_settings,
    }))
}

/// Office-held event stream that reports when a device completes
/// enrollment. Emits a single `enrolled` event and ends.
pub async fn wait_for_enrollment(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Path(device_id): Path<Uuid>,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, ApiError> {
    let devices = DeviceRepository::new(state.pool.clone());
    find_device(&devices, device_id).await?;
    state
        .access
        .can_access_device(&auth.subject, device_id, false)
        .await?;

    // Subscribe before the enrolled re-check so a redemption between the
    // two cannot be missed entirely.
    let mut subscription = state
        .broker
        .subscribe_enrollments_raw()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(4);
    let threshold = state.config.presence.threshold_secs;
    let pool = state.pool.clone();

    tokio::spawn(async move {
        let devices = DeviceRepository::new(pool);

        // The device may have enrolled before the subscription existed.
        match devices.find_by_device_id(device_id).await {
            Ok(Some(entity)) => {
                let device = Device::from(entity);
                if device.is_enrolled() {
                    let _ = send_enrolled_event(&tx, &device, threshold).await;
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(%device_id, "Enrollment wait lookup failed: {}", e);
                return;
            }
        }

        loop {
            let delivery = tokio::select! {
                _ = tx.closed() => break,
                maybe = subscription.next() => match maybe {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let announcement: EnrollmentAnnouncement =
                match serde_json::from_slice(delivery.payload()) {
                    Ok(announcement) => announcement,
                    Err(e) => {
                        tracing::warn!("Undecodable enrollment announcement: {}", e);
                        delivery.nack();
                        break;
                    }
                };

            if announcement.device_id != device_id {
                delivery.ack();
                continue;
            }

            match devices.find_by_device_id(device_id).await {
                Ok(Some(entity)) => {
                    let device = Device::from(entity);
                    let _ = send_enrolled_event(&tx, &device, threshold).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%device_id, "Enrollment wait lookup failed: {}", e);
                }
            }
            delivery.ack();
            break;
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn send_enrolled_event(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    device: &Device,
    threshold_secs: u64,
) -> Result<(), ()> {
    let response = DeviceResponse::from_device(device, threshold_secs);
    let event = Event::default()
        .event("enrolled")
        .json_data(&response)
        .map_err(|_| ())?;
    tx.send(Ok(event)).await.map_err(|_| ())
}
