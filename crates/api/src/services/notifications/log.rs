//! Log-only notification sender for development.

use async_trait::async_trait;

use domain::services::{CallNotification, NotificationError, NotificationSender};

pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send_call_notification(
        &self,
        token: &str,
        notification: &CallNotification,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            token = %token,
            call_id = %notification.call_id,
            "Would send call notification"
        );
        Ok(())
    }
}
