//! Durable outcome storage for Parlor, backed by SQLite.
//!
//! Live room state is memory-only by design; this crate only records the
//! outcomes of finished rooms and serves read-side history queries. It is
//! never consulted to reconstruct a live room.

mod outcomes;

pub use outcomes::SqliteOutcomeStore;
