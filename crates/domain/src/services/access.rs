//! Tenant access policy.
//!
//! Consulted before every office-initiated action. The policy is a
//! capability passed in by construction, never looked up from ambient
//! context.

use thiserror::Error;
use uuid::Uuid;

/// Error type for access checks.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("subject has no access to the requested resource")]
    NoAccess,

    #[error("access check failed: {0}")]
    Internal(String),
}

/// Decides whether an office subject may act on a tenant or device.
#[async_trait::async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Checks access to a single device, optionally requiring the admin
    /// role on the owning tenant.
    async fn can_access_device(
        &self,
        subject: &str,
        device_id: Uuid,
        admin_required: bool,
    ) -> Result<(), AccessError>;

    /// Checks access to a tenant, optionally requiring the admin role.
    async fn can_access_tenant(
        &self,
        subject: &str,
        tenant_id: Uuid,
        admin_required: bool,
    ) -> Result<(), AccessError>;
}
