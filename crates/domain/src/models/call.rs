//! Call domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default pickup validity window after call creation.
pub const DEFAULT_CALL_VALIDITY_SECS: u64 = 3600;

/// A placed call, durable in the outbox until its validity window elapses.
///
/// Rows are never mutated after insertion; expiry is enforced as a read
/// predicate so a stale row behaves exactly like a missing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: i64,
    pub call_id: Uuid,
    pub device_id: Uuid,
    pub device_credential: String,
    pub room_id: String,
    pub created_at: DateTime<Utc>,
}

/// Office-side response when a call is placed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallResponse {
    pub call_id: Uuid,
    pub room_id: String,
    pub office_credential: String,
}

/// Device-side response when a call is picked up from the outbox.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetailsResponse {
    pub call_id: Uuid,
    pub room_id: String,
    pub device_credential: String,
}

impl From<Call> for CallDetailsResponse {
    fn from(call: Call) -> Self {
        Self {
            call_id: call.call_id,
            room_id: call.room_id,
            device_credential: call.device_credential,
        }
    }
}
