//! Expired-call cleanup background job.
//!
//! Pickup reads already treat expired rows as missing, so this job only
//! reclaims storage.

use sqlx::PgPool;
use tracing::info;

use persistence::repositories::CallRepository;

use super::scheduler::{Job, JobFrequency};

pub struct CleanupCallsJob {
    calls: CallRepository,
    validity_secs: u64,
    interval_secs: u64,
}

impl CleanupCallsJob {
    pub fn new(pool: PgPool, validity_secs: u64, interval_secs: u64) -> Self {
        Self {
            calls: CallRepository::new(pool),
            validity_secs,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for CleanupCallsJob {
    fn name(&self) -> &'static str {
        "cleanup_calls"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let deleted = self
            .calls
            .delete_expired(self.validity_secs)
            .await
            .map_err(|e| format!("Failed to delete expired calls: {}", e))?;

        if deleted > 0 {
            info!(deleted, "Expired calls cleaned up");
        }
        Ok(())
    }
}
