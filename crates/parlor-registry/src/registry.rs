//! The connection registry: tracks live connections and their attachments.
//!
//! # Concurrency note
//!
//! All state lives behind a single `parking_lot::Mutex`, and every method is
//! synchronous: the lock is only ever held around in-memory map work, never
//! across an await. Delivery to a connection goes through an unbounded
//! channel sender, so handing an event to a subscriber can't block either.

use std::collections::HashMap;

use parking_lot::Mutex;
use parlor_protocol::{ParticipantId, RoomId, ServerEvent};
use parlor_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::RegistryError;

/// Channel sender used to deliver outbound events to a connection's handler
/// task, which forwards them onto the socket.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// The room/participant a connection currently represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
}

struct ConnectionEntry {
    sender: EventSender,
    attachment: Option<Attachment>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Per-room subscriber lists, in attach order.
    rooms: HashMap<RoomId, Vec<ConnectionId>>,
    /// Index from participant to its (single) connection.
    participants: HashMap<ParticipantId, ConnectionId>,
}

/// Tracks every live connection and which participant/room it belongs to.
///
/// Exactly one instance exists per process; it is constructed explicitly at
/// startup and shared as an `Arc` between the accept loop and the room
/// layer.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection and its outbound event channel.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateConnection`] if the id is already present.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        sender: EventSender,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.connections.contains_key(&connection_id) {
            return Err(RegistryError::DuplicateConnection(connection_id));
        }
        inner.connections.insert(
            connection_id,
            ConnectionEntry { sender, attachment: None },
        );
        tracing::debug!(%connection_id, "connection registered");
        Ok(())
    }

    /// Records which room/participant a connection represents.
    ///
    /// Idempotent when called again with identical arguments.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownConnection`] if the connection was never
    ///   registered.
    /// - [`RegistryError::ConflictingAttachment`] if it is already attached
    ///   to a different room or participant.
    pub fn attach(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .connections
            .get_mut(&connection_id)
            .ok_or(RegistryError::UnknownConnection(connection_id))?;

        match &entry.attachment {
            Some(existing)
                if existing.room_id == room_id
                    && existing.participant_id == participant_id =>
            {
                return Ok(());
            }
            Some(existing) => {
                return Err(RegistryError::ConflictingAttachment(
                    connection_id,
                    existing.room_id.clone(),
                ));
            }
            None => {}
        }

        entry.attachment = Some(Attachment {
            room_id: room_id.clone(),
            participant_id,
        });
        inner.rooms.entry(room_id.clone()).or_default().push(connection_id);
        inner.participants.insert(participant_id, connection_id);

        tracing::debug!(%connection_id, %room_id, %participant_id, "connection attached");
        Ok(())
    }

    /// Returns the current subscribers of a room, in attach order.
    pub fn connections_for_room(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .lock()
            .rooms
            .get(room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns each subscriber of a room paired with its event sender.
    ///
    /// Senders are cheap clones; the dispatcher uses this to fan out without
    /// holding the registry lock during delivery.
    pub fn subscribers(&self, room_id: &RoomId) -> Vec<(ConnectionId, EventSender)> {
        let inner = self.inner.lock();
        let Some(ids) = inner.rooms.get(room_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                inner
                    .connections
                    .get(id)
                    .map(|entry| (*id, entry.sender.clone()))
            })
            .collect()
    }

    /// Removes a connection entirely, returning its attachment (if any) so
    /// the caller can run the participant's leave path.
    ///
    /// Safe to call for an already-absent connection.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Attachment> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.remove(&connection_id)?;
        let attachment = entry.attachment;
        if let Some(att) = &attachment {
            Self::drop_from_indexes(&mut inner, connection_id, att);
        }
        tracing::debug!(%connection_id, "connection unregistered");
        attachment
    }

    /// Clears a connection's attachment but keeps the connection registered.
    ///
    /// Returns the previous attachment, or `None` if it had none.
    pub fn detach(&self, connection_id: ConnectionId) -> Option<Attachment> {
        let mut inner = self.inner.lock();
        let attachment = inner
            .connections
            .get_mut(&connection_id)
            .and_then(|entry| entry.attachment.take())?;
        Self::drop_from_indexes(&mut inner, connection_id, &attachment);
        tracing::debug!(%connection_id, room_id = %attachment.room_id, "connection detached");
        Some(attachment)
    }

    /// Detaches every connection subscribed to a room.
    ///
    /// Called when a room is torn down; the connections themselves stay
    /// registered and can join another room.
    pub fn detach_room(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(ids) = inner.rooms.remove(room_id) else {
            return Vec::new();
        };
        for id in &ids {
            if let Some(entry) = inner.connections.get_mut(id) {
                if let Some(att) = entry.attachment.take() {
                    inner.participants.remove(&att.participant_id);
                }
            }
        }
        tracing::debug!(%room_id, detached = ids.len(), "room detached");
        ids
    }

    /// Returns a connection's current attachment.
    ///
    /// # Errors
    /// [`RegistryError::UnknownConnection`] if the connection was never
    /// registered.
    pub fn attachment(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Attachment>, RegistryError> {
        let inner = self.inner.lock();
        inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.attachment.clone())
            .ok_or(RegistryError::UnknownConnection(connection_id))
    }

    /// Looks up the connection and room a participant is bound to.
    pub fn find_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Option<(ConnectionId, RoomId)> {
        let inner = self.inner.lock();
        let connection_id = *inner.participants.get(&participant_id)?;
        let attachment = inner
            .connections
            .get(&connection_id)?
            .attachment
            .as_ref()?;
        Some((connection_id, attachment.room_id.clone()))
    }

    /// Delivers an event directly to one connection.
    ///
    /// Returns `false` if the connection is gone or its channel is closed.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let sender = {
            let inner = self.inner.lock();
            match inner.connections.get(&connection_id) {
                Some(entry) => entry.sender.clone(),
                None => return false,
            }
        };
        sender.send(event).is_ok()
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Returns `true` if no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().connections.is_empty()
    }

    /// Drops every connection and index. Used on shutdown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.connections.clear();
        inner.rooms.clear();
        inner.participants.clear();
    }

    fn drop_from_indexes(
        inner: &mut RegistryInner,
        connection_id: ConnectionId,
        attachment: &Attachment,
    ) {
        if let Some(subs) = inner.rooms.get_mut(&attachment.room_id) {
            subs.retain(|id| *id != connection_id);
            if subs.is_empty() {
                inner.rooms.remove(&attachment.room_id);
            }
        }
        inner.participants.remove(&attachment.participant_id);
    }
}

// =========================================================================
// Tests
// =========================================================================
