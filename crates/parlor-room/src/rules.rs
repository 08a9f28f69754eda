//! The `GameRules` trait — the extension point for game-specific logic.
//!
//! The room layer knows nothing about any particular game: payloads are
//! opaque JSON values, and every `game_action` is funneled through a rules
//! implementation supplied by the embedding application. Rules run inside
//! the room's update lock, so they must be synchronous and pure in-memory
//! work.

use parlor_protocol::ParticipantId;
use serde_json::Value;

/// Game-specific behavior plugged into the lifecycle manager.
pub trait GameRules: Send + Sync + 'static {
    /// Applies one participant action to the room's payload.
    ///
    /// `turn_order` is the room's participant ids in join order. Returning
    /// `Err` rejects the action with the given reason; the payload must be
    /// left unchanged in that case.
    fn apply(
        &self,
        payload: &mut Value,
        actor: ParticipantId,
        turn_order: &[ParticipantId],
        action: Value,
    ) -> Result<(), String>;

    /// Returns `true` when the payload represents a completed game.
    ///
    /// Checked after every applied action; the room finishes automatically
    /// when this becomes true. Default: games never self-finish.
    fn is_finished(&self, _payload: &Value) -> bool {
        false
    }

    /// Produces the durable summary for a finished room.
    ///
    /// Default: the full payload.
    fn outcome(&self, payload: &Value) -> Value {
        payload.clone()
    }
}

/// The default rules: accept every action from any room member.
///
/// Object actions are shallow-merged into an object payload; any other
/// action replaces the payload wholesale. This gives generic state
/// progression without assuming anything about the game.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeformRules;

impl GameRules for FreeformRules {
    fn apply(
        &self,
        payload: &mut Value,
        _actor: ParticipantId,
        _turn_order: &[ParticipantId],
        action: Value,
    ) -> Result<(), String> {
        match (payload, action) {
            (Value::Object(state), Value::Object(changes)) => {
                for (key, value) in changes {
                    state.insert(key, value);
                }
                Ok(())
            }
            (payload, action) => {
                *payload = action;
                Ok(())
            }
        }
    }
}
