//! Device entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the devices table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEntity {
    pub id: i64,
    pub device_id: Uuid,
    pub tenant_id: Uuid,
    pub display_name: String,
    pub public_key: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceEntity> for domain::models::Device {
    fn from(entity: DeviceEntity) -> Self {
        Self {
            id: entity.id,
            device_id: entity.device_id,
            tenant_id: entity.tenant_id,
            display_name: entity.display_name,
            public_key: entity.public_key,
            last_seen_at: entity.last_seen_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
