//! Office-facing device management endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    CreateDeviceRequest, CreateDeviceResponse, Device, DeviceResponse, RenameDeviceRequest,
    UpdateNotificationTokenRequest,
};
use persistence::repositories::{DeviceRepository, NotificationTokenRepository};
use shared::crypto::{self, ENROLLMENT_KEY_LENGTH};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{authenticate_device, OfficeAuth};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDevicesQuery {
    pub tenant_id: Uuid,
}

/// Creates a device together with its first enrollment ticket.
///
/// The enrollment key in the response is shown exactly once; only its
/// hash is stored.
pub async fn create_device(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Json(request): Json<CreateDeviceRequest>,
) -> Result<Json<CreateDeviceResponse>, ApiError> {
    request.validate()?;
    state
        .access
        .can_access_tenant(&auth.subject, request.tenant_id, true)
        .await?;

    let device_id = Uuid::new_v4();
    let enrollment_key = crypto::random_key(ENROLLMENT_KEY_LENGTH);
    let key_hash = crypto::sha256_hex(&enrollment_key);

    let device: Device = DeviceRepository::new(state.pool.clone())
        .create_with_ticket(
            device_id,
            request.tenant_id,
            &request.display_name,
            &key_hash,
            &request.default_settings,
        )
        .await?
        .into();

    tracing::info!(%device_id, tenant_id = %request.tenant_id, "Device created");

    Ok(Json(CreateDeviceResponse {
        device: DeviceResponse::from_device(&device, state.config.presence.threshold_secs),
        enrollment_key,
    }))
}

/// Lists a tenant's devices with the presence predicate applied.
pub async fn list_devices(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<Vec<DeviceResponse>>, ApiError> {
    state
        .access
        .can_access_tenant(&auth.subject, query.tenant_id, false)
        .await?;

    let devices = DeviceRepository::new(state.pool.clone())
        .list_by_tenant(query.tenant_id)
        .await?;

    let threshold = state.config.presence.threshold_secs;
    let responses = devices
        .into_iter()
        .map(|entity| DeviceResponse::from_device(&Device::from(entity), threshold))
        .collect();

    Ok(Json(responses))
}

/// Renames a device.
pub async fn rename_device(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Path(device_id): Path<Uuid>,
    Json(request): Json<RenameDeviceRequest>,
) -> Result<Json<DeviceResponse>, ApiError> {
    request.validate()?;

    let repo = DeviceRepository::new(state.pool.clone());
    find_device(&repo, device_id).await?;
    state
        .access
        .can_access_device(&auth.subject, device_id, false)
        .await?;

    let renamed: Device = repo
        .rename(device_id, &request.display_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))?
        .into();

    Ok(Json(DeviceResponse::from_device(
        &renamed,
        state.config.presence.threshold_secs,
    )))
}

/// Removes a device. Tickets, calls and notification tokens go with it.
pub async fn delete_device(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Path(device_id): Path<Uuid>,
) -> Result<axum::http::StatusCode, ApiError> {
    let repo = DeviceRepository::new(state.pool.clone());
    find_device(&repo, device_id).await?;
    state
        .access
        .can_access_device(&auth.subject, device_id, true)
        .await?;

    repo.delete(device_id).await?;
    tracing::info!(%device_id, "Device removed");

    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Registers or replaces the push notification token of a device.
///
/// Authenticated by the device itself; by default this does not count as
/// a presence heartbeat since tokens also refresh while the app is
/// backgrounded.
pub async fn update_notification_token(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(request): Json<UpdateNotificationTokenRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    request.validate()?;

    let devices = DeviceRepository::new(state.pool.clone());
    authenticate_device(&devices, bearer.as_ref(), device_id).await?;

    NotificationTokenRepository::new(state.pool.clone())
        .upsert(device_id, &request.token)
        .await?;

    if state.config.presence.token_update_counts {
        state.presence.record_heartbeat(device_id).await?;
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(crate) async fn find_device(
    repo: &DeviceRepository,
    device_id: Uuid,
) -> Result<Device, ApiError> {
    repo.find_by_device_id(device_id)
        .await?
        .map(Device::from)
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))
}
