//! Tenant membership access policy.
//!
//! Office subjects are granted access through tenant membership rows.
//! Admin-gated operations additionally require the admin role.

use async_trait::async_trait;
use uuid::Uuid;

use domain::services::{AccessError, AccessPolicy};
use persistence::repositories::TenantRepository;

const ADMIN_ROLE: &str = "admin";

pub struct TenantMembershipPolicy {
    tenants: TenantRepository,
}

impl TenantMembershipPolicy {
    pub fn new(tenants: TenantRepository) -> Self {
        Self { tenants }
    }

    fn check_role(role: Option<String>, admin_required: bool) -> Result<(), AccessError> {
        match role {
            None => Err(AccessError::NoAccess),
            Some(role) if admin_required && role != ADMIN_ROLE => Err(AccessError::NoAccess),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl AccessPolicy for TenantMembershipPolicy {
    async fn can_access_device(
        &self,
        subject: &str,
        device_id: Uuid,
        admin_required: bool,
    ) -> Result<(), AccessError> {
        let tenant_id = self
            .tenants
            .device_tenant(device_id)
            .await
            .map_err(|e| AccessError::Internal(e.to_string()))?
            .ok_or(AccessError::NoAccess)?;

        self.can_access_tenant(subject, tenant_id, admin_required)
            .await
    }

    async fn can_access_tenant(
        &self,
        subject: &str,
        tenant_id: Uuid,
        admin_required: bool,
    ) -> Result<(), AccessError> {
        let role = self
            .tenants
            .member_role(tenant_id, subject)
            .await
            .map_err(|e| AccessError::Internal(e.to_string()))?;

        Self::check_role(role, admin_required)
    }
}

/// Policy that grants everything, paired with disabled authentication in
/// local development.
pub struct AllowAllPolicy;

#[async_trait]
impl AccessPolicy for AllowAllPolicy {
    async fn can_access_device(
        &self,
        _subject: &str,
        _device_id: Uuid,
        _admin_required: bool,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    async fn can_access_tenant(
        &self,
        _subject: &str,
        _tenant_id: Uuid,
        _admin_required: bool,
    ) -> Result<(), AccessError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_passes_non_admin_check() {
        assert!(TenantMembershipPolicy::check_role(Some("member".into()), false).is_ok());
    }

    #[test]
    fn member_fails_admin_check() {
        assert!(matches!(
            TenantMembershipPolicy::check_role(Some("member".into()), true),
            Err(AccessError::NoAccess)
        ));
    }

    #[test]
    fn admin_passes_admin_check() {
        assert!(TenantMembershipPolicy::check_role(Some("admin".into()), true).is_ok());
    }

    #[test]
    fn non_member_fails() {
        assert!(matches!(
            TenantMembershipPolicy::check_role(None, false),
            Err(AccessError::NoAccess)
        ));
    }
}
