//! HTTP route handlers.

pub mod calls;
pub mod devices;
pub mod enrollment;
pub mod health;
