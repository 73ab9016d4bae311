//! Push notification backends.
//!
//! The backend is selected by `notifications.backend` at startup: `fcm`
//! for production, `directory` for integration setups, `log` otherwise.

pub mod directory;
pub mod fcm;
pub mod log;

use std::sync::Arc;

use anyhow::{bail, Context};

use domain::services::NotificationSender;

use crate::config::NotificationsConfig;

pub use directory::DirectoryNotificationSender;
pub use fcm::FcmNotificationSender;
pub use log::LogNotificationSender;

/// Builds the configured notification sender.
pub fn build_sender(config: &NotificationsConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match config.backend.as_str() {
        "log" => Ok(Arc::new(LogNotificationSender)),
        "directory" => {
            if config.directory.is_empty() {
                bail!("notifications.directory must be set for the directory backend");
            }
            Ok(Arc::new(DirectoryNotificationSender::new(
                config.directory.clone(),
            )))
        }
        "fcm" => {
            let sender = FcmNotificationSender::new(config)
                .context("failed to initialize the FCM backend")?;
            Ok(Arc::new(sender))
        }
        other => bail!("unknown notification backend: {other}"),
    }
}
