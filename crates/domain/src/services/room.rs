//! Video room provider capability.
//!
//! Treated as an opaque signer: it mints a fresh room with one credential
//! per side. Failures propagate as internal errors.

use thiserror::Error;

/// A freshly minted room with per-side credentials.
#[derive(Debug, Clone)]
pub struct RoomGrant {
    /// Fully qualified room identifier both sides join.
    pub room_id: String,
    pub office_credential: String,
    pub device_credential: String,
}

/// Error type for room minting.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("failed to sign room credential: {0}")]
    Signing(String),
}

/// Mints rooms and signed per-side credentials.
pub trait RoomProvider: Send + Sync {
    fn new_room(&self) -> Result<RoomGrant, RoomError>;
}
