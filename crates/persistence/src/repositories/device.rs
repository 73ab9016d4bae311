//! Device repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::DeviceEntity;

/// Repository for device-related database operations.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a device together with its initial enrollment ticket, in one
    /// transaction. The plaintext enrollment key never reaches the
    /// database; only its hash is stored.
    pub async fn create_with_ticket(
        &self,
        device_id: Uuid,
        tenant_id: Uuid,
        display_name: &str,
        enrollment_key_hash: &str,
        device_settings: &serde_json::Value,
    ) -> Result<DeviceEntity, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let device = sqlx::query_as::<_, DeviceEntity>(
            r#"
            INSERT INTO devices (device_id, tenant_id, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, device_id, tenant_id, display_name, public_key,
                      last_seen_at, created_at, updated_at
            "#,
        )
        .bind(device_id)
        .bind(tenant_id)
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO enrollment_tickets (device_id, key_hash, device_settings, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(device_id)
        .bind(enrollment_key_hash)
        .bind(device_settings)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(device)
    }

    /// Find a device by its public UUID.
    pub async fn find_by_device_id(
        &self,
        device_id: Uuid,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, device_id, tenant_id, display_name, public_key,
                   last_seen_at, created_at, updated_at
            FROM devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List all devices of a tenant, sorted by display name.
    pub async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<DeviceEntity>, sqlx::Error> {
        sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, device_id, tenant_id, display_name, public_key,
                   last_seen_at, created_at, updated_at
            FROM devices
            WHERE tenant_id = $1
            ORDER BY display_name ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Rename a device. Returns the updated row, or None if the device is
    /// unknown.
    pub async fn rename(
        &self,
        device_id: Uuid,
        display_name: &str,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        sqlx::query_as::<_, DeviceEntity>(
            r#"
            UPDATE devices
            SET display_name = $2, updated_at = NOW()
            WHERE device_id = $1
            RETURNING id, device_id, tenant_id, display_name, public_key,
                      last_seen_at, created_at, updated_at
            "#,
        )
        .bind(device_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
    }

    /// Hard delete a device. Tickets, calls and notification tokens cascade
    /// at the schema level. Returns the number of rows deleted (0 or 1).
    pub async fn delete(&self, device_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record a presence heartbeat: idempotent upsert of last_seen_at.
    pub async fn update_last_seen_at(
        &self,
        device_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE devices
            SET last_seen_at = $2
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
