//! Error types for the registry layer.

use parlor_protocol::RoomId;
use parlor_transport::ConnectionId;

/// Errors that can occur while tracking connections.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A connection with this id is already registered. Should not occur
    /// under correct transport usage (ids are minted by the accept loop).
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The connection is already attached to a different room.
    #[error("connection {0} is already attached to room {1}")]
    ConflictingAttachment(ConnectionId, RoomId),

    /// The connection was never registered (or has been unregistered).
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// The operation requires the connection to be attached to a room.
    #[error("connection {0} is not attached to a room")]
    NotAttached(ConnectionId),
}

impl RegistryError {
    /// Stable machine-readable code, surfaced to clients in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateConnection(_) => "DUPLICATE_CONNECTION",
            Self::ConflictingAttachment(..) => "CONFLICTING_ATTACHMENT",
            Self::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            Self::NotAttached(_) => "NOT_ATTACHED",
        }
    }
}
