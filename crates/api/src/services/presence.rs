//! Device presence tracking.
//!
//! A device is online while its stored last-seen timestamp is younger than
//! the configured threshold. Heartbeats are written while a device holds a
//! wait stream; a single missed write does not flip the device offline as
//! long as the heartbeat interval is shorter than the threshold.

use chrono::Utc;
use uuid::Uuid;

use domain::models::Device;
use persistence::repositories::DeviceRepository;

#[derive(Clone)]
pub struct PresenceTracker {
    devices: DeviceRepository,
    threshold_secs: u64,
}

impl PresenceTracker {
    pub fn new(devices: DeviceRepository, threshold_secs: u64) -> Self {
        Self {
            devices,
            threshold_secs,
        }
    }

    /// Refreshes the device's last-seen timestamp to now.
    pub async fn record_heartbeat(&self, device_id: Uuid) -> Result<(), sqlx::Error> {
        self.devices.update_last_seen_at(device_id, Utc::now()).await
    }

    /// Whether the device counts as online right now.
    pub fn is_online(&self, device: &Device) -> bool {
        device.is_online_at(Utc::now(), self.threshold_secs)
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn device_last_seen(last_seen_at: Option<chrono::DateTime<Utc>>) -> Device {
        Device {
            id: 1,
            device_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            display_name: "Kitchen".to_string(),
            public_key: Some("key".to_string()),
            last_seen_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tracker() -> PresenceTracker {
        // Repository is never touched by is_online. connect_lazy still needs
        // a runtime handle, so these tests run under tokio.
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/carecall").unwrap();
        PresenceTracker::new(DeviceRepository::new(pool), 120)
    }

    #[tokio::test]
    async fn recent_heartbeat_counts_as_online() {
        let device = device_last_seen(Some(Utc::now() - Duration::seconds(30)));
        assert!(tracker().is_online(&device));
    }

    #[tokio::test]
    async fn stale_heartbeat_counts_as_offline() {
        let device = device_last_seen(Some(Utc::now() - Duration::seconds(121)));
        assert!(!tracker().is_online(&device));
    }

    #[tokio::test]
    async fn never_seen_counts_as_offline() {
        let device = device_last_seen(None);
        assert!(!tracker().is_online(&device));
    }
}
