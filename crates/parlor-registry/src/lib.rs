//! Live connection tracking for Parlor.
//!
//! The [`ConnectionRegistry`] is the single source of truth for which
//! real-time connections exist and which room/participant each one
//! represents. The broadcast dispatcher reads its subscriber lists; the
//! lifecycle layer drives attach/detach as participants move through rooms.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← attaches participants, fans out through subscribers
//!     ↕
//! Registry (this crate) ← connection ↔ participant ↔ room bookkeeping
//!     ↕
//! Transport (below)     ← provides ConnectionId, moves the actual bytes
//! ```

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{Attachment, ConnectionRegistry, EventSender};
