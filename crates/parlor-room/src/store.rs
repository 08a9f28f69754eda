//! The room store: the single source of truth for live rooms.
//!
//! Locking is two-level. The outer map lock covers only id lookup and
//! insertion/removal; each room carries its own lock, created with the room
//! and reclaimed with it. Mutations take a synchronous closure under the
//! room's lock, so concurrent operations on one room serialize while other
//! rooms proceed independently, and the lock can never be held across a
//! suspension point.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parlor_protocol::{RoomId, RoomSnapshot};
use serde_json::Value;

use crate::room::{Room, generate_room_code};
use crate::{RoomConfig, RoomError};

/// How many generated codes to try before giving up on a collision streak.
const CODE_ATTEMPTS: usize = 10;

type SharedRoom = Arc<Mutex<Room>>;

/// In-memory map from room id to room state.
pub struct RoomStore {
    config: RoomConfig,
    rooms: Mutex<HashMap<RoomId, SharedRoom>>,
}

impl RoomStore {
    /// Creates a new, empty store with the given (validated) config.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// The config this store was built with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Allocates a room.
    ///
    /// When `room_id` is `None` a fresh code is generated; a caller-chosen
    /// id that is already taken fails with [`RoomError::AlreadyExists`].
    /// `capacity` falls back to the configured default and is clamped into
    /// `1..=max_capacity`.
    pub fn create(
        &self,
        room_id: Option<RoomId>,
        capacity: Option<usize>,
        initial_payload: Option<Value>,
    ) -> Result<RoomSnapshot, RoomError> {
        let capacity = capacity
            .unwrap_or(self.config.default_capacity)
            .clamp(1, self.config.max_capacity);
        let payload = initial_payload.unwrap_or(Value::Null);

        let mut rooms = self.rooms.lock();
        let id = match room_id {
            Some(id) => {
                if rooms.contains_key(&id) {
                    return Err(RoomError::AlreadyExists(id));
                }
                id
            }
            None => {
                let mut generated = None;
                for _ in 0..CODE_ATTEMPTS {
                    let candidate = RoomId::new(generate_room_code(self.config.code_length));
                    if !rooms.contains_key(&candidate) {
                        generated = Some(candidate);
                        break;
                    }
                }
                // With a 36^6 id space this only happens when the store is
                // pathologically full.
                generated.ok_or_else(|| {
                    RoomError::AlreadyExists(RoomId::new("<exhausted>"))
                })?
            }
        };

        let room = Room::new(id.clone(), capacity, payload);
        let snapshot = room.snapshot();
        rooms.insert(id.clone(), Arc::new(Mutex::new(room)));

        tracing::info!(room_id = %id, capacity, "room created");
        Ok(snapshot)
    }

    /// Returns a fully-formed snapshot of a room.
    pub fn get(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        let room = self.handle(room_id)?;
        let guard = room.lock();
        Ok(guard.snapshot())
    }

    /// Applies an atomic read-modify-write to a room's game-state payload.
    ///
    /// The mutator runs under the room's own lock; concurrent updates to the
    /// same room serialize, updates to different rooms do not interact.
    pub fn update_payload<T>(
        &self,
        room_id: &RoomId,
        mutator: impl FnOnce(&mut Value) -> T,
    ) -> Result<T, RoomError> {
        let room = self.handle(room_id)?;
        let mut guard = room.lock();
        Ok(mutator(&mut guard.payload))
    }

    /// Runs a closure against the full room state under its lock.
    ///
    /// Crate-internal: lifecycle transitions need the participant list and
    /// status, not just the payload.
    pub(crate) fn with_room<T>(
        &self,
        room_id: &RoomId,
        f: impl FnOnce(&mut Room) -> T,
    ) -> Result<T, RoomError> {
        let room = self.handle(room_id)?;
        let mut guard = room.lock();
        Ok(f(&mut guard))
    }

    /// Deletes a room. A no-op (not an error) when the room is already
    /// absent, to tolerate races between teardown and disconnect handling.
    pub fn remove(&self, room_id: &RoomId) {
        if self.rooms.lock().remove(room_id).is_some() {
            tracing::info!(%room_id, "room removed");
        }
    }

    /// Returns `true` if the room exists.
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().contains_key(room_id)
    }

    /// Returns the number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Returns `true` if no rooms exist.
    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }

    /// Ids of all live rooms.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.lock().keys().cloned().collect()
    }

    /// Clones out the room's lock handle, releasing the outer map lock
    /// before the caller touches the room itself.
    fn handle(&self, room_id: &RoomId) -> Result<SharedRoom, RoomError> {
        self.rooms
            .lock()
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }
}

// =========================================================================
// Tests
// =========================================================================
