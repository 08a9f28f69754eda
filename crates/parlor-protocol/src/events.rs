//! The wire events clients and the server exchange.
//!
//! Events are internally-tagged JSON (`{"type": "join_room", ...}`) so a
//! browser client can switch on a single `type` field. Snapshot broadcasts
//! carry a per-room sequence number; clients use it to detect dropped or
//! reordered delivery.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ParticipantId, RoomId, RoomOutcome, RoomSnapshot};

/// Events sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Allocate a room. `room_id` may be omitted to have the server generate
    /// a code; `capacity` and `payload` fall back to configured defaults.
    CreateRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        capacity: Option<usize>,
        #[serde(default)]
        payload: Option<Value>,
    },

    /// Join a room under a display name.
    JoinRoom {
        room_id: RoomId,
        display_name: String,
    },

    /// Leave the room this connection is attached to.
    LeaveRoom,

    /// Begin the game in a room (`open` → `in_progress`).
    StartGame { room_id: RoomId },

    /// Apply a game action to the attached room's payload.
    GameAction { action: Value },

    /// Request a participant's past outcomes. Defaults to the participant
    /// this connection is attached to; pass an explicit id after a room has
    /// closed (clients learn theirs from `room_joined`).
    History {
        #[serde(default)]
        participant_id: Option<ParticipantId>,
    },
}

/// Events sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once, immediately after the connection is registered.
    Connected { connection_id: u64 },

    /// Reply to a successful `create_room`.
    RoomCreated { room: RoomSnapshot },

    /// Reply to a successful `join_room`. The matching state broadcast
    /// follows on the same connection.
    RoomJoined {
        room_id: RoomId,
        participant_id: ParticipantId,
    },

    /// Broadcast: the room's state changed. `seq` increases by one per
    /// broadcast within a room.
    RoomStateUpdate { seq: u64, room: RoomSnapshot },

    /// Broadcast: the room was torn down and no further events will follow.
    RoomClosed { room_id: RoomId, seq: u64 },

    /// Reply to a `history` request, most recent outcome first.
    History { outcomes: Vec<RoomOutcome> },

    /// A request failed. `kind` is a stable machine-readable code.
    Error { kind: String, message: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is consumed by non-Rust clients, so these tests pin
    //! the exact JSON shapes rather than just round-tripping.

    use super::*;

    #[test]
    fn test_client_event_join_room_json_shape() {
        let event = ClientEvent::JoinRoom {
            room_id: RoomId::new("AB12CD"),
            display_name: "ada".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "join_room");
        assert_eq!(json["room_id"], "AB12CD");
        assert_eq!(json["display_name"], "ada");
    }

    #[test]
    fn test_client_event_create_room_defaults_are_optional() {
        // A bare create_room should parse with every option omitted.
        let event: ClientEvent =
            serde_json::from_str(r#"{"type": "create_room"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::CreateRoom { room_id: None, capacity: None, payload: None }
        );
    }

    #[test]
    fn test_client_event_leave_room_round_trip() {
        let event = ClientEvent::LeaveRoom;
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_client_event_history_participant_is_optional() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type": "history"}"#).unwrap();
        assert_eq!(event, ClientEvent::History { participant_id: None });

        let event: ClientEvent =
            serde_json::from_str(r#"{"type": "history", "participant_id": 7}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::History { participant_id: Some(ParticipantId(7)) }
        );
    }

    #[test]
    fn test_client_event_game_action_carries_opaque_value() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type": "game_action", "action": {"word": "crate"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::GameAction { action } => {
                assert_eq!(action["word"], "crate");
            }
            other => panic!("expected GameAction, got {other:?}"),
        }
    }

    #[test]
    fn test_server_event_room_state_update_json_shape() {
        let event = ServerEvent::RoomStateUpdate {
            seq: 3,
            room: RoomSnapshot {
                room_id: RoomId::new("R1"),
                status: crate::RoomStatus::Open,
                participants: vec![],
                capacity: 2,
                payload: serde_json::Value::Null,
                created_at: chrono::Utc::now(),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "room_state_update");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["room"]["room_id"], "R1");
        assert_eq!(json["room"]["status"], "open");
    }

    #[test]
    fn test_server_event_room_closed_json_shape() {
        let event = ServerEvent::RoomClosed { room_id: RoomId::new("R1"), seq: 9 };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "room_closed");
        assert_eq!(json["room_id"], "R1");
        assert_eq!(json["seq"], 9);
    }

    #[test]
    fn test_server_event_error_json_shape() {
        let event = ServerEvent::Error {
            kind: "ROOM_FULL".into(),
            message: "room R1 is full".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "ROOM_FULL");
    }

    #[test]
    fn test_server_event_history_round_trip() {
        let event = ServerEvent::History {
            outcomes: vec![RoomOutcome {
                room_id: RoomId::new("R1"),
                participants: vec![],
                summary: serde_json::json!({"rounds": 4}),
                finished_at: 1_700_000_000,
            }],
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
