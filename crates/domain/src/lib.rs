//! Domain layer for the Carecall backend.
//!
//! This crate contains:
//! - Domain models (Device, Call, enrollment and token payloads)
//! - Capability traits consumed by the delivery coordinator
//! - The in-process broadcast broker used for live call delivery

pub mod messaging;
pub mod models;
pub mod services;
