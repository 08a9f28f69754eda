//! The live room representation and room-code generation.

use chrono::{DateTime, Utc};
use parlor_protocol::{ParticipantId, ParticipantInfo, RoomId, RoomSnapshot, RoomStatus};
use rand::Rng;
use serde_json::Value;

/// Alphabet for generated room codes: unambiguous when read aloud is not a
/// goal, but uppercase-plus-digits matches what players expect to type.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random room code of the given length.
pub(crate) fn generate_room_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// A live room. Only ever touched under its own lock inside the
/// [`RoomStore`](crate::RoomStore); everything outside sees [`RoomSnapshot`]s.
#[derive(Debug)]
pub(crate) struct Room {
    pub(crate) id: RoomId,
    pub(crate) status: RoomStatus,
    /// Join order, which doubles as turn order.
    pub(crate) participants: Vec<ParticipantInfo>,
    pub(crate) capacity: usize,
    /// Game-state payload, opaque to this crate.
    pub(crate) payload: Value,
    pub(crate) created_at: DateTime<Utc>,
}

impl Room {
    pub(crate) fn new(id: RoomId, capacity: usize, payload: Value) -> Self {
        Self {
            id,
            status: RoomStatus::Open,
            participants: Vec::new(),
            capacity,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Produces the immutable view handed to readers and broadcasts.
    pub(crate) fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            status: self.status,
            participants: self.participants.clone(),
            capacity: self.capacity,
            payload: self.payload.clone(),
            created_at: self.created_at,
        }
    }

    pub(crate) fn contains(&self, participant_id: ParticipantId) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }

    pub(crate) fn name_taken(&self, display_name: &str) -> bool {
        self.participants.iter().any(|p| p.display_name == display_name)
    }

    /// Removes a participant, preserving the order of the rest.
    /// Returns `false` if the participant was not present.
    pub(crate) fn remove_participant(&mut self, participant_id: ParticipantId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != participant_id);
        self.participants.len() != before
    }

    pub(crate) fn turn_order(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: u64, name: &str) -> ParticipantInfo {
        ParticipantInfo { id: ParticipantId(id), display_name: name.into() }
    }

    #[test]
    fn test_generate_room_code_length_and_charset() {
        for _ in 0..50 {
            let code = generate_room_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_new_room_starts_open_and_empty() {
        let room = Room::new(RoomId::new("R1"), 4, Value::Null);
        assert_eq!(room.status, RoomStatus::Open);
        assert!(room.participants.is_empty());
        assert_eq!(room.capacity, 4);
    }

    #[test]
    fn test_remove_participant_preserves_order() {
        let mut room = Room::new(RoomId::new("R1"), 4, Value::Null);
        room.participants.push(participant(1, "a"));
        room.participants.push(participant(2, "b"));
        room.participants.push(participant(3, "c"));

        assert!(room.remove_participant(ParticipantId(2)));

        assert_eq!(
            room.turn_order(),
            vec![ParticipantId(1), ParticipantId(3)]
        );
    }

    #[test]
    fn test_remove_absent_participant_returns_false() {
        let mut room = Room::new(RoomId::new("R1"), 4, Value::Null);
        assert!(!room.remove_participant(ParticipantId(9)));
    }

    #[test]
    fn test_name_taken_is_exact_match() {
        let mut room = Room::new(RoomId::new("R1"), 4, Value::Null);
        room.participants.push(participant(1, "ada"));

        assert!(room.name_taken("ada"));
        assert!(!room.name_taken("Ada"));
        assert!(!room.name_taken("grace"));
    }

    #[test]
    fn test_snapshot_reflects_room_fields() {
        let mut room = Room::new(RoomId::new("R1"), 2, serde_json::json!({"n": 1}));
        room.participants.push(participant(1, "ada"));

        let snapshot = room.snapshot();

        assert_eq!(snapshot.room_id, RoomId::new("R1"));
        assert_eq!(snapshot.capacity, 2);
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(snapshot.payload["n"], 1);
    }
}
