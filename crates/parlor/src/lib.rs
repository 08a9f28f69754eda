//! # Parlor
//!
//! A single-process room server for small real-time web games. Clients
//! connect over WebSocket, create or join rooms by code, and receive
//! ordered state broadcasts as the room changes; finished games are
//! persisted through a pluggable outcome store.
//!
//! Room state lives in process memory by design — the deployment contract
//! is exactly one worker per instance. See `parlor-room` for the core and
//! `parlor-store` for the SQLite outcome store.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use parlor::{ServerBuilder, prelude::*};
//!
//! # async fn run() -> Result<(), parlor::ParlorError> {
//! let store = MemoryOutcomeStore::new();
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(FreeformRules, store)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ParlorError;
pub use server::{Server, ServerBuilder};

/// Convenient re-exports of the types embedders touch most.
pub mod prelude {
    pub use parlor_protocol::{
        ClientEvent, ParticipantId, ParticipantInfo, RoomId, RoomOutcome, RoomSnapshot,
        RoomStatus, ServerEvent,
    };
    pub use parlor_room::{
        FreeformRules, GameRules, MemoryOutcomeStore, OutcomeStore, RoomConfig,
    };

    pub use crate::{ParlorError, Server, ServerBuilder};
}
