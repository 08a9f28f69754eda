//! Word-chain: a minimal turn-based game on top of Parlor.
//!
//! Participants take turns (in join order) appending one word to a shared
//! chain; the game ends after a fixed number of full rounds. Run it, then
//! point a WebSocket client at the printed address:
//!
//! ```text
//! {"type": "create_room", "payload": {"words": [], "turn": 0, "rounds_left": 3}}
//! {"type": "join_room", "room_id": "AB12CD", "display_name": "ada"}
//! {"type": "start_game", "room_id": "AB12CD"}
//! {"type": "game_action", "action": {"word": "crate"}}
//! ```
//!
//! Configuration comes from the environment, as deployment tooling expects:
//! `PARLOR_ADDR` (default `127.0.0.1:8080`) and `PARLOR_DB`
//! (default `word-chain.db`).

use parlor::prelude::*;
use parlor_store::SqliteOutcomeStore;
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Game rules
// ---------------------------------------------------------------------------

struct WordChain;

impl GameRules for WordChain {
    fn apply(
        &self,
        payload: &mut Value,
        actor: ParticipantId,
        turn_order: &[ParticipantId],
        action: Value,
    ) -> Result<(), String> {
        let Some(word) = action["word"].as_str() else {
            return Err("action must carry a \"word\" string".into());
        };
        if word.trim().is_empty() {
            return Err("word must not be empty".into());
        }
        if turn_order.is_empty() {
            return Err("no participants".into());
        }

        let turn = payload["turn"].as_u64().unwrap_or(0) as usize;
        let expected = turn_order[turn % turn_order.len()];
        if actor != expected {
            return Err(format!("not your turn (waiting for {expected})"));
        }

        let words = payload["words"].as_array().cloned().unwrap_or_default();
        let mut words = words;
        words.push(json!(word.trim()));
        payload["words"] = Value::Array(words);

        let next_turn = turn + 1;
        payload["turn"] = json!(next_turn);
        if next_turn % turn_order.len() == 0 {
            let rounds_left = payload["rounds_left"].as_u64().unwrap_or(1);
            payload["rounds_left"] = json!(rounds_left.saturating_sub(1));
        }
        Ok(())
    }

    fn is_finished(&self, payload: &Value) -> bool {
        payload["rounds_left"].as_u64() == Some(0)
    }

    fn outcome(&self, payload: &Value) -> Value {
        json!({
            "words": payload["words"],
            "length": payload["words"].as_array().map(Vec::len).unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), ParlorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::var("PARLOR_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let db_path = std::env::var("PARLOR_DB").unwrap_or_else(|_| "word-chain.db".into());

    let store = SqliteOutcomeStore::connect(&db_path).await?;

    let server = ServerBuilder::new()
        .bind(&addr)
        .room_config(RoomConfig {
            min_participants: 2,
            default_capacity: 6,
            ..RoomConfig::default()
        })
        .build(WordChain, store)
        .await?;

    tracing::info!(%addr, db = %db_path, "word-chain server up");
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    fn fresh_payload(rounds: u64) -> Value {
        json!({"words": [], "turn": 0, "rounds_left": rounds})
    }

    #[test]
    fn test_turn_enforcement() {
        let mut payload = fresh_payload(2);
        let order = [pid(1), pid(2)];

        // Participant 2 may not move first.
        let result = WordChain.apply(&mut payload, pid(2), &order, json!({"word": "nope"}));
        assert!(result.is_err());
        assert_eq!(payload["words"].as_array().unwrap().len(), 0);

        // Participant 1 may.
        WordChain
            .apply(&mut payload, pid(1), &order, json!({"word": "crate"}))
            .unwrap();
        assert_eq!(payload["words"][0], "crate");
        assert_eq!(payload["turn"], 1);
    }

    #[test]
    fn test_round_counting_and_finish() {
        let mut payload = fresh_payload(1);
        let order = [pid(1), pid(2)];

        WordChain.apply(&mut payload, pid(1), &order, json!({"word": "a"})).unwrap();
        assert!(!WordChain.is_finished(&payload));

        WordChain.apply(&mut payload, pid(2), &order, json!({"word": "b"})).unwrap();
        assert!(WordChain.is_finished(&payload));

        let outcome = WordChain.outcome(&payload);
        assert_eq!(outcome["length"], 2);
    }

    #[test]
    fn test_rejects_missing_or_blank_word() {
        let mut payload = fresh_payload(1);
        let order = [pid(1)];

        assert!(WordChain.apply(&mut payload, pid(1), &order, json!({})).is_err());
        assert!(
            WordChain
                .apply(&mut payload, pid(1), &order, json!({"word": "   "}))
                .is_err()
        );
    }
}
