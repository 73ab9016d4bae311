//! Shared utilities and common types for the Carecall backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (random keys, hashing)
//! - JWT verification for device-signed and office tokens

pub mod crypto;
pub mod jwt;
