//! Push-notification token payloads.

use serde::Deserialize;
use validator::Validate;

/// Request payload for a device updating its notification token.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationTokenRequest {
    #[validate(length(min = 1, max = 4096, message = "Token must be 1 to 4096 characters"))]
    pub token: String,
}
