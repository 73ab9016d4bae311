//! Call outbox repository for database operations.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::CallEntity;

/// Repository for the call outbox.
///
/// Rows are write-once; pickup reads apply the validity window as a
/// predicate so an expired row behaves like a missing one. Physical cleanup
/// is opportunistic and owned by a background job.
#[derive(Clone)]
pub struct CallRepository {
    pool: PgPool,
}

impl CallRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for a place-and-notify pairing.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Insert a call into the outbox inside the caller's transaction, so
    /// the write can be paired atomically with the notification send.
    pub async fn place(
        tx: &mut Transaction<'_, Postgres>,
        call_id: Uuid,
        device_id: Uuid,
        device_credential: &str,
        room_id: &str,
    ) -> Result<CallEntity, sqlx::Error> {
        sqlx::query_as::<_, CallEntity>(
            r#"
            INSERT INTO calls (call_id, device_id, device_credential, room_id, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, call_id, device_id, device_credential, room_id, created_at
            "#,
        )
        .bind(call_id)
        .bind(device_id)
        .bind(device_credential)
        .bind(room_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Pull a call for pickup. Returns None for unknown calls, calls
    /// addressed to another device, and calls older than the validity
    /// window, even if the row still exists.
    pub async fn find_valid(
        &self,
        device_id: Uuid,
        call_id: Uuid,
        validity_secs: u64,
    ) -> Result<Option<CallEntity>, sqlx::Error> {
        sqlx::query_as::<_, CallEntity>(
            r#"
            SELECT id, call_id, device_id, device_credential, room_id, created_at
            FROM calls
            WHERE call_id = $1
              AND device_id = $2
              AND created_at > NOW() - ($3 * INTERVAL '1 second')
            "#,
        )
        .bind(call_id)
        .bind(device_id)
        .bind(validity_secs as i64)
        .fetch_optional(&self.pool)
        .await
    }

    /// Opportunistic garbage collection of rows past the validity window.
    /// Never required for correctness. Returns the number of rows deleted.
    pub async fn delete_expired(&self, validity_secs: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM calls
            WHERE created_at <= NOW() - ($1 * INTERVAL '1 second')
            "#,
        )
        .bind(validity_secs as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
