//! Entity definitions (database row mappings).

pub mod call;
pub mod device;
pub mod enrollment_ticket;
pub mod notification_token;

pub use call::CallEntity;
pub use device::DeviceEntity;
pub use enrollment_ticket::EnrollmentTicketEntity;
pub use notification_token::NotificationTokenEntity;
