//! Room lifecycle orchestration: create, join, leave, start, finish.
//!
//! The manager ties the room store, connection registry, broadcast
//! dispatcher and outcome store together. Every method is synchronous
//! in-memory work except [`history`](LifecycleManager::history); durable
//! writes happen on spawned tasks after the relevant room lock has been
//! released, so persistence can never block or corrupt live state.
//!
//! State machine per room:
//!
//! ```text
//! Open ──start──→ InProgress ──finish──→ Finished → (removed)
//!   │                  │
//!   └── all leave ─────┴──→ Closed → (removed)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parlor_protocol::{ParticipantId, ParticipantInfo, RoomId, RoomOutcome, RoomSnapshot, RoomStatus};
use parlor_registry::{Attachment, ConnectionRegistry, RegistryError};
use parlor_transport::ConnectionId;
use serde_json::Value;

use crate::dispatch::{BroadcastDispatcher, RoomBroadcast};
use crate::persist::{OutcomeStore, spawn_save};
use crate::rules::GameRules;
use crate::store::RoomStore;
use crate::{LifecycleError, RoomConfig, RoomError};

/// Counter for minting participant ids.
static NEXT_PARTICIPANT_ID: AtomicU64 = AtomicU64::new(1);

/// Creates, joins, starts, finishes and reaps rooms.
///
/// One instance per process, constructed explicitly at startup alongside the
/// registry it shares with the transport layer.
pub struct LifecycleManager<R: GameRules, S: OutcomeStore> {
    config: RoomConfig,
    rules: R,
    store: RoomStore,
    registry: Arc<ConnectionRegistry>,
    dispatcher: BroadcastDispatcher,
    persistence: Arc<S>,
}

impl<R: GameRules, S: OutcomeStore> LifecycleManager<R, S> {
    /// Wires up a manager over a shared connection registry.
    pub fn new(
        config: RoomConfig,
        rules: R,
        persistence: S,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let config = config.validated();
        Self {
            store: RoomStore::new(config.clone()),
            dispatcher: BroadcastDispatcher::new(Arc::clone(&registry)),
            config,
            rules,
            registry,
            persistence: Arc::new(persistence),
        }
    }

    /// The underlying room store (read access for callers and tests).
    pub fn rooms(&self) -> &RoomStore {
        &self.store
    }

    /// The broadcast dispatcher (sequence inspection for tests).
    pub fn dispatcher(&self) -> &BroadcastDispatcher {
        &self.dispatcher
    }

    /// Allocates a room; see [`RoomStore::create`].
    pub fn create_room(
        &self,
        room_id: Option<RoomId>,
        capacity: Option<usize>,
        initial_payload: Option<Value>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.store.create(room_id, capacity, initial_payload)
    }

    /// Adds a participant to a room and attaches their connection.
    ///
    /// Valid only while the room is `Open`. Joining the room you are
    /// already attached to is idempotent and returns the existing
    /// participant id.
    ///
    /// # Errors
    /// - [`RoomError::NotJoinable`] when the room has started or closed
    /// - [`RoomError::Full`] when the room is at capacity
    /// - [`RoomError::NameTaken`] on a duplicate display name
    /// - [`RegistryError::ConflictingAttachment`] when the connection is in
    ///   a different room
    pub fn join(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        display_name: &str,
    ) -> Result<ParticipantId, LifecycleError> {
        if let Some(existing) = self.registry.attachment(connection_id)? {
            if existing.room_id == *room_id {
                return Ok(existing.participant_id);
            }
            return Err(
                RegistryError::ConflictingAttachment(connection_id, existing.room_id).into(),
            );
        }

        let participant_id =
            ParticipantId(NEXT_PARTICIPANT_ID.fetch_add(1, Ordering::Relaxed));

        let snapshot = self.store.with_room(room_id, |room| {
            if !room.status.is_joinable() {
                return Err(RoomError::NotJoinable(room.id.clone(), room.status));
            }
            if room.participants.len() >= room.capacity {
                return Err(RoomError::Full(room.id.clone()));
            }
            if room.name_taken(display_name) {
                return Err(RoomError::NameTaken {
                    room_id: room.id.clone(),
                    display_name: display_name.to_string(),
                });
            }
            room.participants.push(ParticipantInfo {
                id: participant_id,
                display_name: display_name.to_string(),
            });
            Ok(room.snapshot())
        })??;

        if let Err(e) = self
            .registry
            .attach(connection_id, room_id.clone(), participant_id)
        {
            // The registry refused the attachment; undo the membership.
            let _ = self.store.with_room(room_id, |room| {
                room.remove_participant(participant_id);
            });
            return Err(e.into());
        }

        tracing::info!(%room_id, %participant_id, display_name, "participant joined");
        let dead = self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot));
        self.reap(dead);
        Ok(participant_id)
    }

    /// Removes a participant from whichever room it occupies.
    ///
    /// Safe to call for an unknown participant (no-op). The participant's
    /// connection stays registered and can join another room.
    pub fn leave(&self, participant_id: ParticipantId) {
        let Some((connection_id, _room_id)) = self.registry.find_participant(participant_id)
        else {
            return;
        };
        self.leave_connection(connection_id);
    }

    /// Leave path keyed by connection, for `leave_room` wire events.
    /// No-op when the connection is not attached.
    pub fn leave_connection(&self, connection_id: ConnectionId) {
        let Some(attachment) = self.registry.attachment(connection_id).ok().flatten()
        else {
            return;
        };
        let dead = self.depart(connection_id, &attachment);
        self.reap(dead);
    }

    /// Disconnect path: unregisters the connection entirely, then runs the
    /// leave path for its participant, if any.
    pub fn handle_disconnect(&self, connection_id: ConnectionId) {
        let Some(attachment) = self.registry.unregister(connection_id) else {
            return;
        };
        tracing::info!(
            %connection_id,
            participant_id = %attachment.participant_id,
            "connection lost, leaving room"
        );
        let dead = self.remove_from_room(&attachment.room_id, attachment.participant_id);
        self.reap(dead);
    }

    /// Begins the game: `Open → InProgress`.
    ///
    /// # Errors
    /// [`RoomError::InvalidTransition`] when the room is not `Open` or the
    /// configured minimum participant count is unmet.
    pub fn start(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        let min = self.config.min_participants;
        let snapshot = self.store.with_room(room_id, |room| {
            if !room.status.can_transition_to(RoomStatus::InProgress) {
                return Err(RoomError::InvalidTransition(format!(
                    "cannot start room {} while {}",
                    room.id, room.status
                )));
            }
            if room.participants.len() < min {
                return Err(RoomError::InvalidTransition(format!(
                    "room {} needs at least {min} participants to start",
                    room.id
                )));
            }
            room.status = RoomStatus::InProgress;
            Ok(room.snapshot())
        })??;

        tracing::info!(%room_id, "game started");
        let dead = self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot.clone()));
        self.reap(dead);
        Ok(snapshot)
    }

    /// Applies a participant action to a room through the game rules.
    ///
    /// Valid only while `InProgress`. When the rules report the game
    /// finished afterwards, the room is finished and persisted.
    pub fn game_action(
        &self,
        room_id: &RoomId,
        actor: ParticipantId,
        action: Value,
    ) -> Result<(), LifecycleError> {
        let rules = &self.rules;
        let (snapshot, finished) = self.store.with_room(room_id, |room| {
            if room.status != RoomStatus::InProgress {
                return Err(RoomError::InvalidTransition(format!(
                    "room {} does not accept actions while {}",
                    room.id, room.status
                )));
            }
            if !room.contains(actor) {
                return Err(RoomError::ActionRejected(format!(
                    "participant {actor} is not in room {}",
                    room.id
                )));
            }
            let turn_order = room.turn_order();
            rules
                .apply(&mut room.payload, actor, &turn_order, action)
                .map_err(RoomError::ActionRejected)?;
            let summary = rules
                .is_finished(&room.payload)
                .then(|| rules.outcome(&room.payload));
            Ok((room.snapshot(), summary))
        })??;

        let dead = self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot));
        self.reap(dead);

        if let Some(summary) = finished {
            self.finish(room_id, summary)?;
        }
        Ok(())
    }

    /// Completes the game: `InProgress → Finished`, hands the outcome to
    /// the persistence adapter, then tears the room down.
    ///
    /// The room lock is released before the persistence call; the write
    /// itself runs fire-and-forget with retries.
    pub fn finish(&self, room_id: &RoomId, summary: Value) -> Result<RoomOutcome, RoomError> {
        let (snapshot, outcome) = self.store.with_room(room_id, |room| {
            if !room.status.can_transition_to(RoomStatus::Finished) {
                return Err(RoomError::InvalidTransition(format!(
                    "cannot finish room {} while {}",
                    room.id, room.status
                )));
            }
            room.status = RoomStatus::Finished;
            let outcome = RoomOutcome {
                room_id: room.id.clone(),
                participants: room.participants.clone(),
                summary,
                finished_at: chrono::Utc::now().timestamp(),
            };
            Ok((room.snapshot(), outcome))
        })??;

        tracing::info!(%room_id, "game finished");
        spawn_save(Arc::clone(&self.persistence), outcome.clone());

        let mut dead = self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot));
        dead.extend(self.teardown(room_id));
        self.reap(dead);
        Ok(outcome)
    }

    /// Past outcomes for a participant, most recent first.
    pub async fn history(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Vec<RoomOutcome>, crate::PersistenceError> {
        self.persistence.load_history(participant_id).await
    }

    /// Explicit teardown on shutdown: closes every room and clears the
    /// registry. Pending persistence tasks are unaffected.
    pub fn shutdown(&self) {
        for room_id in self.store.room_ids() {
            let _ = self.store.with_room(&room_id, |room| {
                if !room.status.is_terminal() {
                    room.status = RoomStatus::Closed;
                }
            });
            self.teardown(&room_id);
        }
        self.registry.clear();
        tracing::info!("lifecycle shut down");
    }

    /// Explicit-leave variant of [`remove_from_room`](Self::remove_from_room):
    /// the connection is still live, so when the room empties the leaver
    /// stays subscribed long enough to receive the closing broadcast.
    fn depart(
        &self,
        connection_id: ConnectionId,
        attachment: &Attachment,
    ) -> Vec<ConnectionId> {
        let room_id = &attachment.room_id;
        let participant_id = attachment.participant_id;

        let result = self.store.with_room(room_id, |room| {
            if !room.remove_participant(participant_id) {
                return None;
            }
            if room.participants.is_empty() {
                if !room.status.is_terminal() {
                    room.status = RoomStatus::Closed;
                }
                Some(None)
            } else {
                Some(Some(room.snapshot()))
            }
        });

        match result {
            Err(_) | Ok(None) => {
                self.registry.detach(connection_id);
                Vec::new()
            }
            Ok(Some(Some(snapshot))) => {
                tracing::info!(%room_id, %participant_id, "participant left");
                // Detach first so the leaver does not see the update.
                self.registry.detach(connection_id);
                self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot))
            }
            Ok(Some(None)) => {
                tracing::info!(%room_id, %participant_id, "last participant left, closing room");
                // Teardown broadcasts `room_closed` while the leaver is
                // still subscribed, then detaches everyone.
                self.teardown(room_id)
            }
        }
    }

    /// Removes one participant from a room, closing the room if it empties.
    /// Returns connections found dead while broadcasting.
    fn remove_from_room(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
    ) -> Vec<ConnectionId> {
        // A missing room is tolerated: teardown may have raced the
        // disconnect that triggered this call.
        let result = self.store.with_room(room_id, |room| {
            if !room.remove_participant(participant_id) {
                return None;
            }
            if room.participants.is_empty() {
                if !room.status.is_terminal() {
                    room.status = RoomStatus::Closed;
                }
                Some(None)
            } else {
                Some(Some(room.snapshot()))
            }
        });

        match result {
            Err(_) | Ok(None) => Vec::new(),
            Ok(Some(Some(snapshot))) => {
                tracing::info!(%room_id, %participant_id, "participant left");
                self.dispatcher.publish(room_id, RoomBroadcast::State(snapshot))
            }
            Ok(Some(None)) => {
                tracing::info!(%room_id, %participant_id, "last participant left, closing room");
                self.teardown(room_id)
            }
        }
    }

    /// Broadcasts `room_closed`, then removes the room and every index tied
    /// to it. Returns connections found dead while broadcasting.
    fn teardown(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let dead = self.dispatcher.publish(room_id, RoomBroadcast::Closed);
        self.registry.detach_room(room_id);
        self.store.remove(room_id);
        self.dispatcher.forget(room_id);
        dead
    }

    /// Runs the unregister/leave path for connections whose channel died
    /// mid-broadcast. Processing one dead connection can surface more; the
    /// loop drains them all.
    fn reap(&self, mut dead: Vec<ConnectionId>) {
        while let Some(connection_id) = dead.pop() {
            let Some(attachment) = self.registry.unregister(connection_id) else {
                continue;
            };
            tracing::debug!(%connection_id, "reaped dead connection");
            dead.extend(
                self.remove_from_room(&attachment.room_id, attachment.participant_id),
            );
        }
    }
}
