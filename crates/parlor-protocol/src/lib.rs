//! Wire protocol for Parlor.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Types** ([`RoomId`], [`ParticipantId`], [`RoomSnapshot`], …) — the
//!   identifiers and state snapshots that travel on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the tagged JSON events
//!   exchanged over a connection.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how events become bytes.
//!
//! The protocol layer knows nothing about sockets, rooms, or persistence —
//! it only defines shapes.

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{
    ParticipantId, ParticipantInfo, RoomId, RoomOutcome, RoomSnapshot, RoomStatus,
};
