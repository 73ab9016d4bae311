//! Enrollment ticket entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the enrollment_tickets table.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentTicketEntity {
    pub id: i64,
    pub device_id: Uuid,
    pub key_hash: String,
    pub device_settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
