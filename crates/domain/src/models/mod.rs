//! Domain models.

pub mod call;
pub mod device;
pub mod enrollment;
pub mod notification_token;

pub use call::{Call, CallDetailsResponse, StartCallResponse, DEFAULT_CALL_VALIDITY_SECS};
pub use device::{
    CreateDeviceRequest, CreateDeviceResponse, Device, DeviceResponse, RenameDeviceRequest,
    DEFAULT_PRESENCE_THRESHOLD_SECS,
};
pub use enrollment::{BeginEnrollmentResponse, RedeemEnrollmentRequest, RedeemEnrollmentResponse};
pub use notification_token::UpdateNotificationTokenRequest;
