//! Call placement, pickup and live delivery endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use domain::messaging::CallAnnouncement;
use domain::models::{Call, CallDetailsResponse, StartCallResponse};
use persistence::repositories::{CallRepository, DeviceRepository, NotificationTokenRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{authenticate_device, metrics, OfficeAuth};
use crate::routes::devices::find_device;

/// Places a call to an enrolled, online device.
///
/// The outbox write and the wake-up notification commit or fail together;
/// the live broadcast afterwards is best effort because subscribed devices
/// can also pull the call via the outbox.
pub async fn start_call(
    State(state): State<AppState>,
    Extension(auth): Extension<OfficeAuth>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<StartCallResponse>, ApiError> {
    let devices = DeviceRepository::new(state.pool.clone());
    let device = find_device(&devices, device_id).await?;
    state
        .access
        .can_access_device(&auth.subject, device_id, false)
        .await?;

    if !device.is_enrolled() {
        return Err(ApiError::FailedPrecondition(
            "Device is not enrolled yet".to_string(),
        ));
    }
    if !state.presence.is_online(&device) {
        return Err(ApiError::FailedPrecondition(
            "Device is offline".to_string(),
        ));
    }

    let token = NotificationTokenRepository::new(state.pool.clone())
        .find_by_device(device_id)
        .await?;
    if token.is_none() && state.config.calls.require_notification_token {
        return Err(ApiError::FailedPrecondition(
            "Device has no notification token".to_string(),
        ));
    }

    let grant = state.rooms.new_room()?;
    let call_id = Uuid::new_v4();

    let calls = CallRepository::new(state.pool.clone());
    let mut tx = calls.begin().await?;
    CallRepository::place(
        &mut tx,
        call_id,
        device_id,
        &grant.device_credential,
        &grant.room_id,
    )
    .await?;

    if let Some(token) = token {
        let notification =
            domain::services::CallNotification::incoming_call(call_id, &device.display_name);
        // A failed send rolls the outbox row back with the transaction.
        state
            .notifier
            .send_call_notification(&token.token, &notification)
            .await?;
    }

    tx.commit().await?;
    metrics::record_call_placed();
    tracing::info!(%call_id, %device_id, room_id = %grant.room_id, "Call placed");

    let announcement = CallAnnouncement {
        call_id,
        device_id,
        device_credential: grant.device_credential,
        room_id: grant.room_id.clone(),
    };
    // The call is durable; a failed broadcast only costs the fast path.
    if let Err(e) = state.broker.publish_call(&announcement).await {
        tracing::warn!(%call_id, "Failed to broadcast call: {}", e);
    }

    Ok(Json(StartCallResponse {
        call_id,
        room_id: grant.room_id,
        office_credential: grant.office_credential,
    }))
}

/// Pulls a placed call from the outbox.
///
/// Unknown calls, calls for another device and calls past the validity
/// window all answer not found.
pub async fn get_call_details(
    State(state): State<AppState>,
    Path((device_id, call_id)): Path<(Uuid, Uuid)>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<CallDetailsResponse>, ApiError> {
    let devices = DeviceRepository::new(state.pool.clone());
    authenticate_device(&devices, bearer.as_ref(), device_id).await?;

    let call: Call = CallRepository::new(state.pool.clone())
        .find_valid(device_id, call_id, state.config.calls.validity_secs)
        .await?
        .ok_or_else(|| ApiError::NotFound("Call not found".to_string()))?
        .into();

    Ok(Json(CallDetailsResponse::from(call)))
}

/// Device-held event stream delivering calls as they are placed.
///
/// Holding the stream is what makes a device present: a heartbeat is
/// written on attach and on every interval tick until the client goes
/// away.
pub async fn wait_for_call(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, ApiError> {
    let devices = DeviceRepository::new(state.pool.clone());
    authenticate_device(&devices, bearer.as_ref(), device_id).await?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(4);
    let broker = state.broker.clone();
    let presence = state.presence.clone();
    let heartbeat_interval = Duration::from_secs(state.config.presence.heartbeat_interval_secs);

    tokio::spawn(async move {
        let heartbeat = async {
            let mut interval = tokio::time::interval(heartbeat_interval);
            // First tick fires immediately and doubles as the attach
            // heartbeat.
            loop {
                interval.tick().await;
                if let Err(e) = presence.record_heartbeat(device_id).await {
                    tracing::warn!(%device_id, "Failed to write presence heartbeat: {}", e);
                }
            }
        };

        let deliver = broker.subscribe_to_calls(device_id, |call| {
            let tx = tx.clone();
            async move {
                let response = CallDetailsResponse {
                    call_id: call.call_id,
                    room_id: call.room_id,
                    device_credential: call.device_credential,
                };
                let event = Event::default().event("call").json_data(&response)?;
                tx.send(Ok(event))
                    .await
                    .map_err(|_| "wait stream closed")?;
                metrics::record_call_delivered();
                Ok(())
            }
        });

        tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(%device_id, "Wait stream closed by client");
            }
            result = deliver => {
                if let Err(e) = result {
                    tracing::debug!(%device_id, "Wait stream subscription ended: {}", e);
                }
            }
            _ = heartbeat => unreachable!("heartbeat loop never completes"),
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
