//! Error types for the room layer.

use parlor_protocol::{RoomId, RoomStatus};
use parlor_registry::RegistryError;

/// Errors that can occur during room operations.
///
/// Structural errors are returned to the caller and surfaced to the
/// originating connection as an `error` event; they never affect other
/// rooms or crash the process.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A room with this id already exists.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// The room is at capacity.
    #[error("room {0} is full")]
    Full(RoomId),

    /// The room is not accepting joins in its current status.
    #[error("room {0} is not joinable while {1}")]
    NotJoinable(RoomId, RoomStatus),

    /// The requested lifecycle transition is not valid.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The display name is already taken in this room.
    #[error("display name {display_name:?} is already taken in room {room_id}")]
    NameTaken { room_id: RoomId, display_name: String },

    /// The game rules rejected the action.
    #[error("action rejected: {0}")]
    ActionRejected(String),
}

impl RoomError {
    /// Stable machine-readable code, surfaced to clients in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ROOM_NOT_FOUND",
            Self::AlreadyExists(_) => "ROOM_ALREADY_EXISTS",
            Self::Full(_) => "ROOM_FULL",
            Self::NotJoinable(..) => "ROOM_NOT_JOINABLE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::NameTaken { .. } => "NAME_TAKEN",
            Self::ActionRejected(_) => "ACTION_REJECTED",
        }
    }
}

/// Errors produced by lifecycle operations, which touch both the room store
/// and the connection registry.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LifecycleError {
    /// Stable machine-readable code for `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Room(e) => e.kind(),
            Self::Registry(e) => e.kind(),
        }
    }
}
