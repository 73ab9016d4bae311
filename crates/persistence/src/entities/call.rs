//! Call entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the calls table (the outbox).
#[derive(Debug, Clone, FromRow)]
pub struct CallEntity {
    pub id: i64,
    pub call_id: Uuid,
    pub device_id: Uuid,
    pub device_credential: String,
    pub room_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<CallEntity> for domain::models::Call {
    fn from(entity: CallEntity) -> Self {
        Self {
            id: entity.id,
            call_id: entity.call_id,
            device_id: entity.device_id,
            device_credential: entity.device_credential,
            room_id: entity.room_id,
            created_at: entity.created_at,
        }
    }
}
