//! Tenant membership repository, backing the access policy.

use sqlx::PgPool;
use uuid::Uuid;

/// Repository for tenant membership lookups.
#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Role of a subject on a tenant, or None when not a member.
    pub async fn member_role(
        &self,
        tenant_id: Uuid,
        subject: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT role
            FROM tenant_members
            WHERE tenant_id = $1 AND subject = $2
            "#,
        )
        .bind(tenant_id)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(role,)| role))
    }

    /// Owning tenant of a device, or None for an unknown device.
    pub async fn device_tenant(&self, device_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT tenant_id
            FROM devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(tenant_id,)| tenant_id))
    }
}
