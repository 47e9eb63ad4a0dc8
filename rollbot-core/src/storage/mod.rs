pub mod change_feed;
pub mod event_store;
pub mod roll_store;

pub use change_feed::{ChangeFeed, ChangeStream, SqliteChangeFeed};
pub use event_store::{EventStore, SqliteEventStore};
pub use roll_store::RollStore;

use crate::error::{Result, RollError};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RollError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Roll events; draw_time is unix milliseconds (UTC)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS roll_events (
                id TEXT PRIMARY KEY,
                group_id INTEGER NOT NULL,
                group_name TEXT NOT NULL DEFAULT '',
                announcement_message_id INTEGER,
                organizer_id INTEGER NOT NULL,
                organizer_name TEXT NOT NULL DEFAULT '',
                prize TEXT NOT NULL,
                draw_time INTEGER NOT NULL,
                winner_count INTEGER NOT NULL DEFAULT 1,
                source TEXT NOT NULL DEFAULT 'chat',
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
            )",
            [],
        )?;

        // Natural identity, only once the announcement exists
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS roll_events_identity
             ON roll_events (group_id, announcement_message_id)
             WHERE announcement_message_id IS NOT NULL",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS roll_events_pending
             ON roll_events (group_id, status, draw_time)",
            [],
        )?;

        // Participants table, one row per (event, user)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS roll_participants (
                event_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                display_name TEXT NOT NULL,
                joined_at INTEGER NOT NULL,
                FOREIGN KEY (event_id) REFERENCES roll_events(id),
                PRIMARY KEY (event_id, user_id)
            )",
            [],
        )?;

        // Winners table, ordered by seq
        conn.execute(
            "CREATE TABLE IF NOT EXISTS roll_winners (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                display_name TEXT NOT NULL,
                drawn_at INTEGER NOT NULL,
                FOREIGN KEY (event_id) REFERENCES roll_events(id)
            )",
            [],
        )?;

        // Change log backing the change feed
        conn.execute(
            "CREATE TABLE IF NOT EXISTS roll_changes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                operation TEXT NOT NULL,
                event_id TEXT NOT NULL,
                changed_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute_batch(
            "CREATE TRIGGER IF NOT EXISTS roll_events_after_insert
             AFTER INSERT ON roll_events
             BEGIN
                INSERT INTO roll_changes (operation, event_id, changed_at)
                VALUES ('insert', NEW.id, CAST(strftime('%s', 'now') AS INTEGER));
             END;

             CREATE TRIGGER IF NOT EXISTS roll_events_after_update
             AFTER UPDATE ON roll_events
             BEGIN
                INSERT INTO roll_changes (operation, event_id, changed_at)
                VALUES ('update', NEW.id, CAST(strftime('%s', 'now') AS INTEGER));
             END;",
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
