//! Roll lottery core: event records, participant sets, configuration and
//! SQLite-backed persistence with a change feed.
//!
//! The scheduling engine built on top of these lives in `rollbot-lottery`.

pub mod config;
pub mod error;
pub mod participants;
pub mod storage;
pub mod types;

pub use config::{BridgeConfig, RollConfig};
pub use error::{Result, RollError};
pub use participants::ParticipantSet;
pub use storage::{
    ChangeFeed, ChangeStream, EventStore, SqliteChangeFeed, SqliteEventStore, Storage,
};
pub use types::{
    ChangeEvent, ChangeOperation, EventId, EventIdentity, Participant, RollEvent, RollStatus,
    ShortId, Source,
};
