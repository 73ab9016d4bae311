//! Notification token repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::NotificationTokenEntity;

/// Repository for notification token database operations.
#[derive(Clone)]
pub struct NotificationTokenRepository {
    pool: PgPool,
}

impl NotificationTokenRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a device's notification token. At most one token per device.
    pub async fn upsert(
        &self,
        device_id: Uuid,
        token: &str,
    ) -> Result<NotificationTokenEntity, sqlx::Error> {
        sqlx::query_as::<_, NotificationTokenEntity>(
            r#"
            INSERT INTO notification_tokens (device_id, token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                token = EXCLUDED.token,
                updated_at = EXCLUDED.updated_at
            RETURNING device_id, token, updated_at
            "#,
        )
        .bind(device_id)
        .bind(token)
        .fetch_one(&self.pool)
        .await
    }

    /// Find a device's current notification token, if any.
    pub async fn find_by_device(
        &self,
        device_id: Uuid,
    ) -> Result<Option<NotificationTokenEntity>, sqlx::Error> {
        sqlx::query_as::<_, NotificationTokenEntity>(
            r#"
            SELECT device_id, token, updated_at
            FROM notification_tokens
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
    }
}
