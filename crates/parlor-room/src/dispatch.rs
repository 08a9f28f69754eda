//! Per-room ordered broadcast.
//!
//! `publish` stamps each event with the room's next sequence number and
//! fans it out to every subscriber in one step, under a per-room dispatch
//! lock. That makes broadcasts within a room totally ordered (sequence
//! numbers strictly increase, and every subscriber observes publishes in
//! call order) while different rooms never contend. Delivery is a
//! non-blocking channel send per connection; a failed send marks that
//! connection dead without touching the others.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parlor_protocol::{RoomId, RoomSnapshot, ServerEvent};
use parlor_registry::ConnectionRegistry;
use parlor_transport::ConnectionId;

/// What to broadcast to a room.
#[derive(Debug, Clone)]
pub enum RoomBroadcast {
    /// The room's state changed; subscribers get the new snapshot.
    State(RoomSnapshot),
    /// The room is being torn down; no further events will follow.
    Closed,
}

/// Fans state-change events out to a room's subscribers, in order.
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    /// Per-room sequence counters, lazily created and reclaimed with the
    /// room via [`forget`](Self::forget).
    sequences: Mutex<HashMap<RoomId, Arc<Mutex<u64>>>>,
}

impl BroadcastDispatcher {
    /// Creates a dispatcher that reads subscriber lists from `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers `broadcast` to every connection currently subscribed to the
    /// room, stamped with the next per-room sequence number.
    ///
    /// Returns the connections whose channel was closed; the caller routes
    /// each one through its unregister path. Failed deliveries never block
    /// or fail delivery to the rest of the room.
    pub fn publish(&self, room_id: &RoomId, broadcast: RoomBroadcast) -> Vec<ConnectionId> {
        let counter = self.counter(room_id);

        // Sequence assignment and fan-out happen under the room's dispatch
        // lock so two publishes to one room cannot interleave.
        let mut seq_guard = counter.lock();
        *seq_guard += 1;
        let seq = *seq_guard;

        let event = match broadcast {
            RoomBroadcast::State(snapshot) => {
                ServerEvent::RoomStateUpdate { seq, room: snapshot }
            }
            RoomBroadcast::Closed => {
                ServerEvent::RoomClosed { room_id: room_id.clone(), seq }
            }
        };

        let mut dead = Vec::new();
        for (connection_id, sender) in self.registry.subscribers(room_id) {
            if sender.send(event.clone()).is_err() {
                tracing::debug!(%connection_id, %room_id, "dropping dead subscriber");
                dead.push(connection_id);
            }
        }

        tracing::trace!(%room_id, seq, dead = dead.len(), "broadcast published");
        dead
    }

    /// Reclaims the room's sequence counter. Called when the room is
    /// removed from the store.
    pub fn forget(&self, room_id: &RoomId) {
        self.sequences.lock().remove(room_id);
    }

    /// The last sequence number published for a room (0 if none).
    pub fn last_seq(&self, room_id: &RoomId) -> u64 {
        self.sequences
            .lock()
            .get(room_id)
            .map(|counter| *counter.lock())
            .unwrap_or(0)
    }

    fn counter(&self, room_id: &RoomId) -> Arc<Mutex<u64>> {
        let mut sequences = self.sequences.lock();
        Arc::clone(sequences.entry(room_id.clone()).or_default())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_protocol::{ParticipantId, RoomStatus};
    use tokio::sync::mpsc;

    fn snapshot(room: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: RoomId::new(room),
            status: RoomStatus::Open,
            participants: vec![],
            capacity: 2,
            payload: serde_json::Value::Null,
            created_at: chrono::Utc::now(),
        }
    }

    fn setup() -> (Arc<ConnectionRegistry>, BroadcastDispatcher) {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BroadcastDispatcher::new(Arc::clone(&registry));
        (registry, dispatcher)
    }

    fn subscribe(
        registry: &ConnectionRegistry,
        conn: u64,
        room: &str,
        participant: u64,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(ConnectionId::new(conn), tx).unwrap();
        registry
            .attach(ConnectionId::new(conn), RoomId::new(room), ParticipantId(participant))
            .unwrap();
        rx
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let (registry, dispatcher) = setup();
        let mut rx1 = subscribe(&registry, 1, "R1", 10);
        let mut rx2 = subscribe(&registry, 2, "R1", 20);

        let dead = dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::State(snapshot("R1")));

        assert!(dead.is_empty());
        assert!(matches!(rx1.try_recv(), Ok(ServerEvent::RoomStateUpdate { seq: 1, .. })));
        assert!(matches!(rx2.try_recv(), Ok(ServerEvent::RoomStateUpdate { seq: 1, .. })));
    }

    #[test]
    fn test_sequence_numbers_strictly_increase_per_room() {
        let (registry, dispatcher) = setup();
        let mut rx = subscribe(&registry, 1, "R1", 10);

        for _ in 0..5 {
            dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::State(snapshot("R1")));
        }

        let mut last = 0;
        for _ in 0..5 {
            match rx.try_recv().unwrap() {
                ServerEvent::RoomStateUpdate { seq, .. } => {
                    assert_eq!(seq, last + 1, "sequence must increase by one");
                    last = seq;
                }
                other => panic!("expected RoomStateUpdate, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rooms_have_independent_sequences() {
        let (registry, dispatcher) = setup();
        let _rx1 = subscribe(&registry, 1, "A", 10);
        let _rx2 = subscribe(&registry, 2, "B", 20);

        dispatcher.publish(&RoomId::new("A"), RoomBroadcast::State(snapshot("A")));
        dispatcher.publish(&RoomId::new("A"), RoomBroadcast::State(snapshot("A")));
        dispatcher.publish(&RoomId::new("B"), RoomBroadcast::State(snapshot("B")));

        assert_eq!(dispatcher.last_seq(&RoomId::new("A")), 2);
        assert_eq!(dispatcher.last_seq(&RoomId::new("B")), 1);
    }

    #[test]
    fn test_dead_subscriber_reported_but_others_delivered() {
        let (registry, dispatcher) = setup();
        let rx1 = subscribe(&registry, 1, "R1", 10);
        let mut rx2 = subscribe(&registry, 2, "R1", 20);
        drop(rx1); // connection 1's handler is gone

        let dead = dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::State(snapshot("R1")));

        assert_eq!(dead, vec![ConnectionId::new(1)]);
        assert!(rx2.try_recv().is_ok(), "live subscriber still receives");
    }

    #[test]
    fn test_publish_to_empty_room_is_harmless() {
        let (_registry, dispatcher) = setup();
        let dead = dispatcher.publish(&RoomId::new("EMPTY"), RoomBroadcast::Closed);
        assert!(dead.is_empty());
        assert_eq!(dispatcher.last_seq(&RoomId::new("EMPTY")), 1);
    }

    #[test]
    fn test_closed_broadcast_carries_room_and_seq() {
        let (registry, dispatcher) = setup();
        let mut rx = subscribe(&registry, 1, "R1", 10);

        dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::State(snapshot("R1")));
        dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::Closed);

        rx.try_recv().unwrap(); // state
        match rx.try_recv().unwrap() {
            ServerEvent::RoomClosed { room_id, seq } => {
                assert_eq!(room_id, RoomId::new("R1"));
                assert_eq!(seq, 2);
            }
            other => panic!("expected RoomClosed, got {other:?}"),
        }
    }

    #[test]
    fn test_forget_resets_sequence() {
        let (_registry, dispatcher) = setup();
        dispatcher.publish(&RoomId::new("R1"), RoomBroadcast::Closed);
        assert_eq!(dispatcher.last_seq(&RoomId::new("R1")), 1);

        dispatcher.forget(&RoomId::new("R1"));

        assert_eq!(dispatcher.last_seq(&RoomId::new("R1")), 0);
    }
}
