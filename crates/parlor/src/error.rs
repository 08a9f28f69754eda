//! Unified error type for the Parlor server.

use parlor_protocol::ProtocolError;
use parlor_registry::RegistryError;
use parlor_room::{LifecycleError, PersistenceError, RoomError};
use parlor_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors automatically
/// inside the server and handler.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (duplicate or conflicting connections).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A room-level error (full, not found, invalid transition).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A combined lifecycle error.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A persistence error.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
