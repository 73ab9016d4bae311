//! Enrollment ticket repository for database operations.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::entities::EnrollmentTicketEntity;

/// Outcome of a redemption attempt.
#[derive(Debug, Clone)]
pub struct RedeemedTicket {
    pub device_id: Uuid,
    pub device_settings: serde_json::Value,
}

/// Repository for enrollment ticket database operations.
#[derive(Clone)]
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the live ticket for a device, if any.
    pub async fn find_by_device(
        &self,
        device_id: Uuid,
    ) -> Result<Option<EnrollmentTicketEntity>, sqlx::Error> {
        sqlx::query_as::<_, EnrollmentTicketEntity>(
            r#"
            SELECT id, device_id, key_hash, device_settings, created_at
            FROM enrollment_tickets
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Issue a ticket for a device, replacing any live one. The old key is
    /// invalidated by the replacement; at most one live ticket per device
    /// is enforced by a unique constraint.
    pub async fn replace_ticket(
        &self,
        device_id: Uuid,
        key_hash: &str,
        device_settings: &serde_json::Value,
    ) -> Result<EnrollmentTicketEntity, sqlx::Error> {
        sqlx::query_as::<_, EnrollmentTicketEntity>(
            r#"
            INSERT INTO enrollment_tickets (device_id, key_hash, device_settings, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                key_hash = EXCLUDED.key_hash,
                device_settings = EXCLUDED.device_settings,
                created_at = EXCLUDED.created_at
            RETURNING id, device_id, key_hash, device_settings, created_at
            "#,
        )
        .bind(device_id)
        .bind(key_hash)
        .bind(device_settings)
        .fetch_one(&self.pool)
        .await
    }

    /// Redeem a ticket: bind the device's public key and consume the
    /// ticket, all-or-nothing.
    ///
    /// The row lock taken by `FOR UPDATE` serializes concurrent redemptions
    /// of the same key; the loser re-evaluates the predicate after the
    /// winner's delete and gets `None`. A ticket whose device already has a
    /// public key is unreachable by the join predicate, so a key can never
    /// be redeemed twice.
    pub async fn redeem(
        &self,
        key_hash: &str,
        public_key_pem: &str,
    ) -> Result<Option<RedeemedTicket>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT t.id, t.device_id, t.device_settings
            FROM enrollment_tickets t
            JOIN devices d ON d.device_id = t.device_id
            WHERE t.key_hash = $1 AND d.public_key IS NULL
            FOR UPDATE OF t
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let ticket_id: i64 = row.try_get("id")?;
        let device_id: Uuid = row.try_get("device_id")?;
        let device_settings: serde_json::Value = row.try_get("device_settings")?;

        sqlx::query(
            r#"
            UPDATE devices
            SET public_key = $2, updated_at = NOW()
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .bind(public_key_pem)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM enrollment_tickets
            WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(RedeemedTicket {
            device_id,
            device_settings,
        }))
    }
}
