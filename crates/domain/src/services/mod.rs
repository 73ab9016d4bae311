//! Capability traits consumed by the delivery coordinator.
//!
//! All of these are injected by construction so the core stays testable
//! without a real identity provider, push backend or room service.

pub mod access;
pub mod notification;
pub mod room;

pub use access::{AccessError, AccessPolicy};
pub use notification::{CallNotification, NotificationError, NotificationSender};
pub use room::{RoomError, RoomGrant, RoomProvider};
