//! Service implementations behind the domain capability traits.

pub mod access;
pub mod notifications;
pub mod presence;
pub mod rooms;

#[allow(unused_imports)] // Re-exports for downstream use
pub use access::{AllowAllPolicy, TenantMembershipPolicy};
#[allow(unused_imports)] // Re-exports for downstream use
pub use notifications::build_sender;
#[allow(unused_imports)] // Re-exports for downstream use
pub use presence::PresenceTracker;
#[allow(unused_imports)] // Re-exports for downstream use
pub use rooms::VideoRoomService;
