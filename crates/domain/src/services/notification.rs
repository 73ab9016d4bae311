//! Push-notification sender capability.
//!
//! Backends are named variants selected at startup by configuration: a
//! log-only sender, a filesystem mock, and the real FCM backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Notification kind discriminator carried in the data payload.
pub const NOTIFICATION_TYPE_CALL: &str = "call";

/// Payload of the wake-up notification sent alongside every outbox write.
///
/// Carries the call id so a woken device can pull the call from the outbox
/// even if it never held a live subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNotification {
    pub call_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub body: String,
}

impl CallNotification {
    pub fn incoming_call(call_id: Uuid, device_name: &str) -> Self {
        Self {
            call_id,
            notification_type: NOTIFICATION_TYPE_CALL.to_string(),
            title: "Incoming call".to_string(),
            body: format!("Incoming call for {device_name}"),
        }
    }
}

/// Error type for notification sends.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid notification token")]
    InvalidToken,

    #[error("failed to send notification: {0}")]
    SendFailed(String),
}

/// Sends push notifications to a device's registered token.
#[async_trait::async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_call_notification(
        &self,
        token: &str,
        notification: &CallNotification,
    ) -> Result<(), NotificationError>;
}
