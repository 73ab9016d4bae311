//! Repository implementations.

pub mod call;
pub mod device;
pub mod enrollment;
pub mod notification_token;
pub mod tenant;

pub use call::CallRepository;
pub use device::DeviceRepository;
pub use enrollment::EnrollmentRepository;
pub use notification_token::NotificationTokenRepository;
pub use tenant::TenantRepository;
