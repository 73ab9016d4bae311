//! Filesystem notification sender.
//!
//! Writes each notification as a JSON file under
//! `<directory>/<token>/`, which lets integration setups observe sends
//! without a push provider. Not intended for production.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use domain::services::{CallNotification, NotificationError, NotificationSender};

pub struct DirectoryNotificationSender {
    root: PathBuf,
}

impl DirectoryNotificationSender {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl NotificationSender for DirectoryNotificationSender {
    async fn send_call_notification(
        &self,
        token: &str,
        notification: &CallNotification,
    ) -> Result<(), NotificationError> {
        // Tokens are opaque strings here, so reject anything that could
        // escape the target directory.
        if token.is_empty() || token.contains(['/', '\\', '.']) {
            return Err(NotificationError::InvalidToken);
        }

        let dir = self.root.join(token);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let file = dir.join(format!(
            "notification-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.6f")
        ));
        let payload = serde_json::to_vec_pretty(notification)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        tokio::fs::write(&file, payload)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        tracing::debug!(path = %file.display(), "Wrote notification file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn writes_notification_file() {
        let root = std::env::temp_dir().join(format!("carecall-test-{}", Uuid::new_v4()));
        let sender = DirectoryNotificationSender::new(&root);

        let notification = CallNotification::incoming_call(Uuid::new_v4(), "Kitchen");
        sender
            .send_call_notification("token-abc", &notification)
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(root.join("token-abc")).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let content = tokio::fs::read_to_string(entry.path()).await.unwrap();
        assert!(content.contains(&notification.call_id.to_string()));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal_tokens() {
        let sender = DirectoryNotificationSender::new("/tmp/unused");
        let notification = CallNotification::incoming_call(Uuid::new_v4(), "Kitchen");
        let result = sender
            .send_call_notification("../escape", &notification)
            .await;
        assert!(matches!(result, Err(NotificationError::InvalidToken)));
    }
}
