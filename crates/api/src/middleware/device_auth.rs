//! Device bearer-token authentication.
//!
//! Devices sign their own tokens with the key pair minted during
//! enrollment; verification runs against the public key stored for the
//! device. This cannot be a plain tower layer because the expected key
//! depends on the device id in the request path, so handlers call
//! [`authenticate_device`] directly.

use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use uuid::Uuid;

use domain::models::Device;
use persistence::repositories::DeviceRepository;
use shared::jwt;

use crate::error::ApiError;

/// Verifies a device bearer token for the device id it claims to act as.
///
/// Unknown and unenrolled devices both fail authentication rather than
/// reporting whether the device exists.
pub async fn authenticate_device(
    devices: &DeviceRepository,
    bearer: Option<&TypedHeader<Authorization<Bearer>>>,
    device_id: Uuid,
) -> Result<Device, ApiError> {
    let bearer = bearer
        .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".to_string()))?;

    let device = devices
        .find_by_device_id(device_id)
        .await?
        .map(Device::from)
        .ok_or_else(|| ApiError::Unauthenticated("Invalid device credentials".to_string()))?;

    let public_key = device
        .public_key
        .as_deref()
        .ok_or_else(|| ApiError::Unauthenticated("Invalid device credentials".to_string()))?;

    jwt::verify_device_token(bearer.token(), public_key, &device_id.to_string()).map_err(|e| {
        tracing::debug!(%device_id, "Device token validation failed: {}", e);
        ApiError::Unauthenticated("Invalid device credentials".to_string())
    })?;

    Ok(device)
}
