//! Core identity and snapshot types shared by every layer.
//!
//! Everything here is serializable: snapshots and outcomes travel on the
//! wire verbatim, and the persistence layer stores outcomes as-is.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant (a logical player).
///
/// Participant ids are minted by the lifecycle layer when a participant
/// joins a room, and are distinct from connection ids so that a future
/// reconnection flow can re-bind a participant to a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Room ids are strings so they can be caller-chosen or generated. Generated
/// ids are short uppercase alphanumeric codes that players can read out loud.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a room.
///
/// ```text
/// Open ──→ InProgress ──→ Finished
///   │           │
///   └───────────┴──→ Closed
/// ```
///
/// - **Open**: accepting joins.
/// - **InProgress**: game running; no new joins.
/// - **Finished**: game completed normally; the outcome is persisted and the
///   room is removed.
/// - **Closed**: aborted (all participants left, or explicit shutdown);
///   removed without an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Open,
    InProgress,
    Finished,
    Closed,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new participants.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the room has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Closed)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::InProgress)
                | (Self::InProgress, Self::Finished)
                | (Self::Open, Self::Closed)
                | (Self::InProgress, Self::Closed)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Participants, snapshots, outcomes
// ---------------------------------------------------------------------------

/// A participant as seen by other clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// The participant's unique id.
    pub id: ParticipantId,
    /// Display identity, unique within a room.
    pub display_name: String,
}

/// An immutable, fully-formed copy of a room's state.
///
/// Snapshots are what readers and broadcasts see; the live `Room` is only
/// ever touched under its own lock. Participant order is join order, which
/// doubles as turn order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub participants: Vec<ParticipantInfo>,
    pub capacity: usize,
    /// Game-state payload, opaque to the registry.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl RoomSnapshot {
    /// Participant ids in join order.
    pub fn turn_order(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id).collect()
    }
}

/// The durable summary of a finished room, handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomOutcome {
    pub room_id: RoomId,
    pub participants: Vec<ParticipantInfo>,
    /// Opaque summary produced by the game rules.
    pub summary: Value,
    /// Unix timestamp (seconds) of when the room finished.
    pub finished_at: i64,
}

// =========================================================================
// Tests
// =========================================================================
