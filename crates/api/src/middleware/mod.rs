//! HTTP middleware components.

pub mod device_auth;
pub mod logging;
pub mod metrics;
pub mod office_auth;
pub mod trace_id;

#[allow(unused_imports)] // Re-exports for downstream use
pub use device_auth::authenticate_device;
#[allow(unused_imports)] // Re-exports for downstream use
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
#[allow(unused_imports)] // Re-exports for downstream use
pub use office_auth::{require_office_auth, OfficeAuth};
#[allow(unused_imports)] // Re-exports for downstream use
pub use trace_id::{trace_id, RequestId, REQUEST_ID_HEADER};
