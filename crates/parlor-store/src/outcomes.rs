//! SQLite implementation of the outcome store.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parlor_protocol::{ParticipantId, ParticipantInfo, RoomId, RoomOutcome};
use parlor_room::{OutcomeStore, PersistenceError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Distinguishes in-memory databases across parallel tests; a bare shared
/// `:memory:` URI would collide between pools in one process.
static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS outcomes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id     TEXT    NOT NULL,
    summary     TEXT    NOT NULL,
    finished_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS outcome_participants (
    outcome_id     INTEGER NOT NULL REFERENCES outcomes(id) ON DELETE CASCADE,
    participant_id INTEGER NOT NULL,
    display_name   TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_outcome_participants_pid
    ON outcome_participants(participant_id);
"#;

/// [`OutcomeStore`] over a local SQLite file (or `:memory:`).
#[derive(Clone)]
pub struct SqliteOutcomeStore {
    pool: SqlitePool,
}

impl SqliteOutcomeStore {
    /// Connection acquire timeout, so a wedged pool fails fast instead of
    /// stalling the retry loop.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Opens (creating if missing) the store at `path` and ensures the
    /// schema exists. Pass `":memory:"` for an ephemeral store.
    pub async fn connect(path: &str) -> Result<Self, PersistenceError> {
        let pool = if path == ":memory:" {
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let uri = format!(
                "file:parlor-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );
            let options = SqliteConnectOptions::new()
                .filename(&uri)
                .shared_cache(true)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await
                .map_err(db_err)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(
                            path = %parent.display(),
                            error = %e,
                            "failed to create database directory"
                        );
                    }
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await
                .map_err(db_err)?
        };

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_err)?;

        info!(path, "outcome store connected");
        Ok(Self { pool })
    }

    async fn insert_outcome(&self, outcome: &RoomOutcome) -> Result<(), PersistenceError> {
        let summary =
            serde_json::to_string(&outcome.summary).map_err(|e| {
                PersistenceError::Failure(format!("summary not serializable: {e}"))
            })?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            "INSERT INTO outcomes (room_id, summary, finished_at) VALUES (?, ?, ?)",
        )
        .bind(outcome.room_id.as_str())
        .bind(&summary)
        .bind(outcome.finished_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let outcome_id = result.last_insert_rowid();
        for participant in &outcome.participants {
            sqlx::query(
                "INSERT INTO outcome_participants (outcome_id, participant_id, display_name) \
                 VALUES (?, ?, ?)",
            )
            .bind(outcome_id)
            .bind(participant.id.0 as i64)
            .bind(&participant.display_name)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn query_history(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Vec<RoomOutcome>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT o.id, o.room_id, o.summary, o.finished_at \
             FROM outcomes o \
             JOIN outcome_participants op ON op.outcome_id = o.id \
             WHERE op.participant_id = ? \
             ORDER BY o.finished_at DESC, o.id DESC",
        )
        .bind(participant_id.0 as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome_id: i64 = row.try_get("id").map_err(db_err)?;
            let room_id: String = row.try_get("room_id").map_err(db_err)?;
            let summary_text: String = row.try_get("summary").map_err(db_err)?;
            let finished_at: i64 = row.try_get("finished_at").map_err(db_err)?;

            let summary = serde_json::from_str(&summary_text).map_err(|e| {
                PersistenceError::Failure(format!("stored summary unreadable: {e}"))
            })?;

            let participant_rows = sqlx::query(
                "SELECT participant_id, display_name FROM outcome_participants \
                 WHERE outcome_id = ?",
            )
            .bind(outcome_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            let participants = participant_rows
                .into_iter()
                .map(|p| {
                    Ok(ParticipantInfo {
                        id: ParticipantId(
                            p.try_get::<i64, _>("participant_id").map_err(db_err)? as u64,
                        ),
                        display_name: p.try_get("display_name").map_err(db_err)?,
                    })
                })
                .collect::<Result<Vec<_>, PersistenceError>>()?;

            history.push(RoomOutcome {
                room_id: RoomId::new(room_id),
                participants,
                summary,
                finished_at,
            });
        }
        Ok(history)
    }
}

impl OutcomeStore for SqliteOutcomeStore {
    fn save_outcome(
        &self,
        outcome: &RoomOutcome,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        self.insert_outcome(outcome)
    }

    fn load_history(
        &self,
        participant_id: ParticipantId,
    ) -> impl Future<Output = Result<Vec<RoomOutcome>, PersistenceError>> + Send {
        self.query_history(participant_id)
    }
}

fn db_err(e: sqlx::Error) -> PersistenceError {
    PersistenceError::Failure(e.to_string())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_room::OutcomeStore;

    fn outcome(room: &str, finished_at: i64, participants: &[(u64, &str)]) -> RoomOutcome {
        RoomOutcome {
            room_id: RoomId::new(room),
            participants: participants
                .iter()
                .map(|(id, name)| ParticipantInfo {
                    id: ParticipantId(*id),
                    display_name: name.to_string(),
                })
                .collect(),
            summary: serde_json::json!({ "room": room }),
            finished_at,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = SqliteOutcomeStore::connect(":memory:").await.unwrap();
        let saved = outcome("AB12CD", 100, &[(1, "ada"), (2, "grace")]);

        store.save_outcome(&saved).await.unwrap();

        let history = store.load_history(ParticipantId(1)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], saved);
    }

    #[tokio::test]
    async fn test_history_filters_by_participant() {
        let store = SqliteOutcomeStore::connect(":memory:").await.unwrap();
        store.save_outcome(&outcome("R1", 100, &[(1, "ada")])).await.unwrap();
        store.save_outcome(&outcome("R2", 200, &[(2, "grace")])).await.unwrap();

        let history = store.load_history(ParticipantId(2)).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].room_id, RoomId::new("R2"));
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let store = SqliteOutcomeStore::connect(":memory:").await.unwrap();
        store.save_outcome(&outcome("OLD", 100, &[(1, "ada")])).await.unwrap();
        store.save_outcome(&outcome("NEW", 300, &[(1, "ada")])).await.unwrap();
        store.save_outcome(&outcome("MID", 200, &[(1, "ada")])).await.unwrap();

        let history = store.load_history(ParticipantId(1)).await.unwrap();

        let rooms: Vec<_> = history.iter().map(|o| o.room_id.as_str().to_string()).collect();
        assert_eq!(rooms, vec!["NEW", "MID", "OLD"]);
    }

    #[tokio::test]
    async fn test_history_empty_for_unknown_participant() {
        let store = SqliteOutcomeStore::connect(":memory:").await.unwrap();
        let history = store.load_history(ParticipantId(404)).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteOutcomeStore::connect(path).await.unwrap();
            store.save_outcome(&outcome("R1", 100, &[(1, "ada")])).await.unwrap();
        }

        let store = SqliteOutcomeStore::connect(path).await.unwrap();
        let history = store.load_history(ParticipantId(1)).await.unwrap();
        assert_eq!(history.len(), 1, "outcome must survive a new connection");
    }
}
