//! Enrollment handshake payloads.
//!
//! The enrollment key itself is stored as a SHA-256 hash; the plaintext is
//! handed to the office exactly once. Redemption deletes the ticket in the
//! same transaction that writes the device public key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Response payload when the office issues (or replaces) a ticket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginEnrollmentResponse {
    pub device_id: Uuid,
    pub enrollment_key: String,
}

/// Request payload for the device-side redemption of an enrollment key.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemEnrollmentRequest {
    #[validate(length(min = 1, message = "Enrollment key is required"))]
    pub enrollment_key: String,

    /// RSA public key in PEM format the device will authenticate with.
    #[validate(length(min = 1, message = "Public key is required"))]
    pub public_key: String,
}

/// Response payload for a successful redemption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemEnrollmentResponse {
    pub device_id: Uuid,
    /// Default settings chosen by the office at device creation, forwarded
    /// verbatim.
    pub settings: serde_json::Value,
}
