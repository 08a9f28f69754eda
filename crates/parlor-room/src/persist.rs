//! The persistence seam: durable outcome storage.
//!
//! Persistence is fire-and-forget relative to the in-memory critical path.
//! A finished room's outcome is handed to a spawned task that retries with
//! exponential backoff; a write that keeps failing is logged and dropped —
//! durability is secondary to live-session correctness, and a persistence
//! failure never rolls back or blocks an in-memory transition.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{ParticipantId, RoomOutcome};

/// Attempts per outcome before giving up.
const SAVE_ATTEMPTS: u32 = 4;

/// Backoff before the second attempt; doubles per retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// A failed interaction with the durable store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence failure: {0}")]
    Failure(String),
}

impl PersistenceError {
    /// Stable machine-readable code for `error` events.
    pub fn kind(&self) -> &'static str {
        "PERSISTENCE_FAILURE"
    }
}

/// Durable storage for room outcomes.
///
/// Methods return `impl Future + Send` (rather than plain `async fn`) so
/// callers can spawn them onto the runtime.
pub trait OutcomeStore: Send + Sync + 'static {
    /// Persists the outcome of a finished room.
    fn save_outcome(
        &self,
        outcome: &RoomOutcome,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Loads past outcomes involving a participant, most recent first.
    ///
    /// Read-side reporting only — never used to reconstruct live rooms.
    fn load_history(
        &self,
        participant_id: ParticipantId,
    ) -> impl Future<Output = Result<Vec<RoomOutcome>, PersistenceError>> + Send;
}

/// Saves an outcome, retrying with exponential backoff.
///
/// Returns `true` if the outcome was eventually persisted.
pub async fn save_with_retry<S: OutcomeStore>(store: &S, outcome: &RoomOutcome) -> bool {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=SAVE_ATTEMPTS {
        match store.save_outcome(outcome).await {
            Ok(()) => {
                tracing::debug!(room_id = %outcome.room_id, attempt, "outcome persisted");
                return true;
            }
            Err(e) if attempt < SAVE_ATTEMPTS => {
                tracing::warn!(
                    room_id = %outcome.room_id,
                    attempt,
                    error = %e,
                    "outcome save failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                tracing::warn!(
                    room_id = %outcome.room_id,
                    error = %e,
                    "outcome save failed after {SAVE_ATTEMPTS} attempts, giving up"
                );
            }
        }
    }
    false
}

/// Hands an outcome to the store on a background task.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn_save<S: OutcomeStore>(store: Arc<S>, outcome: RoomOutcome) {
    tokio::spawn(async move {
        save_with_retry(store.as_ref(), &outcome).await;
    });
}

// ---------------------------------------------------------------------------
// MemoryOutcomeStore
// ---------------------------------------------------------------------------

/// An in-memory [`OutcomeStore`], for tests and ephemeral deployments.
///
/// Clones share the same underlying storage, so a test can keep one clone
/// to inspect what the lifecycle layer persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutcomeStore {
    outcomes: Arc<parking_lot::Mutex<Vec<RoomOutcome>>>,
}

impl MemoryOutcomeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All saved outcomes, in save order.
    pub fn all(&self) -> Vec<RoomOutcome> {
        self.outcomes.lock().clone()
    }

    /// Number of saved outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    /// Returns `true` if nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.outcomes.lock().is_empty()
    }
}

impl OutcomeStore for MemoryOutcomeStore {
    fn save_outcome(
        &self,
        outcome: &RoomOutcome,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        let outcome = outcome.clone();
        let outcomes = Arc::clone(&self.outcomes);
        async move {
            outcomes.lock().push(outcome);
            Ok(())
        }
    }

    fn load_history(
        &self,
        participant_id: ParticipantId,
    ) -> impl Future<Output = Result<Vec<RoomOutcome>, PersistenceError>> + Send {
        let outcomes = Arc::clone(&self.outcomes);
        async move {
            let mut history: Vec<RoomOutcome> = outcomes
                .lock()
                .iter()
                .filter(|o| o.participants.iter().any(|p| p.id == participant_id))
                .cloned()
                .collect();
            history.reverse(); // most recent first
            Ok(history)
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
