//! Notification token entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the notification_tokens table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationTokenEntity {
    pub device_id: Uuid,
    pub token: String,
    pub updated_at: DateTime<Utc>,
}
