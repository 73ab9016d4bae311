//! Device domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Default presence threshold: a device is online while its last heartbeat
/// is more recent than this.
pub const DEFAULT_PRESENCE_THRESHOLD_SECS: u64 = 120;

/// A callable device belonging to a tenant.
///
/// A device with a null public key is unenrolled and cannot authenticate or
/// receive calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub device_id: Uuid,
    pub tenant_id: Uuid,
    pub display_name: String,
    pub public_key: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Whether the device has completed the enrollment handshake.
    pub fn is_enrolled(&self) -> bool {
        self.public_key.is_some()
    }

    /// Presence predicate: true while the last heartbeat is younger than
    /// the threshold. False if the device has never sent a heartbeat.
    pub fn is_online_at(&self, now: DateTime<Utc>, threshold_secs: u64) -> bool {
        match self.last_seen_at {
            Some(last_seen) => now - last_seen < Duration::seconds(threshold_secs as i64),
            None => false,
        }
    }

    /// Presence predicate against the current clock and default threshold.
    pub fn is_online(&self) -> bool {
        self.is_online_at(Utc::now(), DEFAULT_PRESENCE_THRESHOLD_SECS)
    }
}

/// Request payload for office-initiated device creation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    pub tenant_id: Uuid,

    #[validate(length(
        min = 2,
        max = 50,
        message = "Display name must be between 2 and 50 characters"
    ))]
    pub display_name: String,

    /// Settings forwarded verbatim to the device when it redeems its
    /// enrollment key.
    #[serde(default)]
    pub default_settings: serde_json::Value,
}

/// Response payload for device creation. The enrollment key is returned
/// exactly once; only its hash is stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceResponse {
    pub device: DeviceResponse,
    pub enrollment_key: String,
}

/// Request payload for renaming a device.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameDeviceRequest {
    #[validate(length(
        min = 2,
        max = 50,
        message = "Display name must be between 2 and 50 characters"
    ))]
    pub display_name: String,
}

/// Device as presented to the office, with the presence predicate applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub device_id: Uuid,
    pub tenant_id: Uuid,
    pub display_name: String,
    pub enrolled: bool,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl DeviceResponse {
    pub fn from_device(device: &Device, threshold_secs: u64) -> Self {
        Self {
            device_id: device.device_id,
            tenant_id: device.tenant_id,
            display_name: device.display_name.clone(),
            enrolled: device.is_enrolled(),
            online: device.is_online_at(Utc::now(), threshold_secs),
            last_seen_at: device.last_seen_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn test_device(last_seen_at: Option<DateTime<Utc>>) -> Device {
        Device {
            id: 1,
            device_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            display_name: Name().fake(),
            public_key: None,
            last_seen_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_offline_without_heartbeat() {
        let device = test_device(None);
        assert!(!device.is_online());
    }

    #[test]
    fn test_online_within_threshold() {
        let now = Utc::now();
        let device = test_device(Some(now - Duration::seconds(30)));
        assert!(device.is_online_at(now, DEFAULT_PRESENCE_THRESHOLD_SECS));
    }

    #[test]
    fn test_offline_at_threshold() {
        let now = Utc::now();
        let device = test_device(Some(now - Duration::seconds(120)));
        assert!(!device.is_online_at(now, DEFAULT_PRESENCE_THRESHOLD_SECS));
    }

    #[test]
    fn test_offline_past_threshold() {
        let now = Utc::now();
        let device = test_device(Some(now - Duration::seconds(600)));
        assert!(!device.is_online_at(now, DEFAULT_PRESENCE_THRESHOLD_SECS));
    }

    #[test]
    fn test_enrolled_requires_public_key() {
        let mut device = test_device(None);
        assert!(!device.is_enrolled());
        device.public_key = Some("-----BEGIN PUBLIC KEY-----".to_string());
        assert!(device.is_enrolled());
    }

    #[test]
    fn test_response_carries_presence() {
        let now = Utc::now();
        let device = test_device(Some(now - Duration::seconds(10)));
        let response = DeviceResponse::from_device(&device, DEFAULT_PRESENCE_THRESHOLD_SECS);
        assert!(response.online);
        assert!(!response.enrolled);
    }
}
