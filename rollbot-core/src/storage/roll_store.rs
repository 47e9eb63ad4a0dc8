use crate::error::Result;
use crate::participants::ParticipantSet;
use crate::storage::Storage;
use crate::types::{
    ChangeEvent, ChangeOperation, EventId, EventIdentity, Participant, RollEvent, RollStatus,
    Source,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

const EVENT_COLUMNS: &str = "id, group_id, group_name, announcement_message_id, organizer_id, \
     organizer_name, prize, draw_time, winner_count, source, status";

/// Row-level access to the roll tables. Every method reports failures; the
/// lenient policy of the engine lives in [`super::SqliteEventStore`].
pub struct RollStore<'a> {
    storage: &'a Storage,
}

impl<'a> RollStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Insert a new event with its seeded participants. Fails on an existing
    /// id or natural identity; nothing is overwritten.
    pub async fn insert_event(&self, event: &RollEvent) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO roll_events
             (id, group_id, group_name, announcement_message_id, organizer_id, organizer_name,
              prize, draw_time, winner_count, source, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.id.to_string(),
                event.group_id,
                event.group_name,
                event.announcement_message_id,
                event.organizer_id,
                event.organizer_name,
                event.prize,
                event.draw_time.timestamp_millis(),
                event.winner_count,
                event.source.as_str(),
                event.status.as_str(),
                Utc::now().timestamp(),
            ],
        )?;

        let now = Utc::now().timestamp();
        for participant in event.participants.snapshot() {
            tx.execute(
                "INSERT OR IGNORE INTO roll_participants (event_id, user_id, display_name, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.id.to_string(),
                    participant.user_id,
                    participant.display_name,
                    now
                ],
            )?;
        }

        for winner in &event.winners {
            tx.execute(
                "INSERT INTO roll_winners (event_id, user_id, display_name, drawn_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![event.id.to_string(), winner.user_id, winner.display_name, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub async fn load_event(&self, id: &EventId) -> Result<Option<RollEvent>> {
        let conn = self.storage.get_connection().await;
        let sql = format!("SELECT {} FROM roll_events WHERE id = ?1", EVENT_COLUMNS);
        let event = conn
            .query_row(&sql, params![id.to_string()], event_from_row)
            .optional()?;

        match event {
            Some(event) => Ok(Some(attach_entries(&conn, event)?)),
            None => Ok(None),
        }
    }

    pub async fn load_event_by_identity(
        &self,
        identity: &EventIdentity,
    ) -> Result<Option<RollEvent>> {
        let conn = self.storage.get_connection().await;
        let sql = format!(
            "SELECT {} FROM roll_events WHERE group_id = ?1 AND announcement_message_id = ?2",
            EVENT_COLUMNS
        );
        let event = conn
            .query_row(
                &sql,
                params![identity.group_id, identity.message_id],
                event_from_row,
            )
            .optional()?;

        match event {
            Some(event) => Ok(Some(attach_entries(&conn, event)?)),
            None => Ok(None),
        }
    }

    /// Pending events of a group drawing strictly after `now`.
    pub async fn load_pending(&self, group_id: i64, now: DateTime<Utc>) -> Result<Vec<RollEvent>> {
        let conn = self.storage.get_connection().await;
        let sql = format!(
            "SELECT {} FROM roll_events
             WHERE group_id = ?1 AND status = ?2 AND draw_time > ?3
             ORDER BY draw_time ASC",
            EVENT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(
                params![
                    group_id,
                    RollStatus::Pending.as_str(),
                    now.timestamp_millis()
                ],
                event_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        events
            .into_iter()
            .map(|event| attach_entries(&conn, event))
            .collect()
    }

    /// Every event of a group, newest draw first.
    pub async fn list_events(&self, group_id: i64) -> Result<Vec<RollEvent>> {
        let conn = self.storage.get_connection().await;
        let sql = format!(
            "SELECT {} FROM roll_events WHERE group_id = ?1 ORDER BY draw_time DESC",
            EVENT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![group_id], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        events
            .into_iter()
            .map(|event| attach_entries(&conn, event))
            .collect()
    }

    /// Set-style append: returns `false` when the user was already in, or
    /// when no event has this identity.
    pub async fn insert_participant(
        &self,
        identity: &EventIdentity,
        participant: &Participant,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO roll_participants (event_id, user_id, display_name, joined_at)
             SELECT id, ?3, ?4, ?5 FROM roll_events
             WHERE group_id = ?1 AND announcement_message_id = ?2",
            params![
                identity.group_id,
                identity.message_id,
                participant.user_id,
                participant.display_name,
                Utc::now().timestamp(),
            ],
        )?;

        Ok(inserted > 0)
    }

    pub async fn insert_winner(&self, id: &EventId, winner: &Participant) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO roll_winners (event_id, user_id, display_name, drawn_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                winner.user_id,
                winner.display_name,
                Utc::now().timestamp()
            ],
        )?;

        Ok(())
    }

    pub async fn set_announcement(&self, id: &EventId, message_id: i32) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE roll_events SET announcement_message_id = ?1 WHERE id = ?2",
            params![message_id, id.to_string()],
        )?;

        Ok(updated > 0)
    }

    pub async fn set_status(&self, id: &EventId, status: RollStatus) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE roll_events SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;

        Ok(updated > 0)
    }

    /// Highest change sequence so far, 0 on an empty log.
    pub async fn latest_change(&self) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM roll_changes",
            [],
            |row| row.get(0),
        )?;

        Ok(seq)
    }

    /// Changes after `cursor` restricted to `operations`, oldest first.
    pub async fn changes_after(
        &self,
        cursor: i64,
        operations: &[ChangeOperation],
        limit: u32,
    ) -> Result<Vec<ChangeEvent>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.storage.get_connection().await;
        let placeholders = (0..operations.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT seq, operation, event_id FROM roll_changes
             WHERE seq > ?1 AND operation IN ({})
             ORDER BY seq ASC LIMIT ?2",
            placeholders
        );

        let mut values: Vec<rusqlite::types::Value> = vec![cursor.into(), i64::from(limit).into()];
        values.extend(
            operations
                .iter()
                .map(|op| rusqlite::types::Value::Text(op.as_str().to_string())),
        );

        let mut stmt = conn.prepare(&sql)?;
        let changes = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                let operation: String = row.get(1)?;
                let event_id: String = row.get(2)?;

                Ok(ChangeEvent {
                    sequence: row.get(0)?,
                    operation: ChangeOperation::from_str(&operation)
                        .map_err(|_| invalid_column(1, "operation"))?,
                    event_id: EventId::from_str(&event_id)
                        .map_err(|_| invalid_column(2, "event_id"))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changes)
    }
}

fn invalid_column(index: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, name.to_string(), rusqlite::types::Type::Text)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<RollEvent> {
    let id: String = row.get(0)?;
    let draw_time_ms: i64 = row.get(7)?;
    let source: String = row.get(9)?;
    let status: String = row.get(10)?;

    Ok(RollEvent {
        id: EventId::from_str(&id).map_err(|_| invalid_column(0, "id"))?,
        group_id: row.get(1)?,
        group_name: row.get(2)?,
        announcement_message_id: row.get(3)?,
        organizer_id: row.get(4)?,
        organizer_name: row.get(5)?,
        prize: row.get(6)?,
        draw_time: DateTime::from_timestamp_millis(draw_time_ms)
            .ok_or_else(|| invalid_column(7, "draw_time"))?,
        winner_count: row.get(8)?,
        source: Source::from_str(&source).map_err(|_| invalid_column(9, "source"))?,
        status: RollStatus::from_str(&status).map_err(|_| invalid_column(10, "status"))?,
        participants: ParticipantSet::new(),
        winners: Vec::new(),
    })
}

fn attach_entries(conn: &Connection, mut event: RollEvent) -> Result<RollEvent> {
    let id = event.id.to_string();

    let mut stmt = conn.prepare(
        "SELECT user_id, display_name FROM roll_participants
         WHERE event_id = ?1 ORDER BY joined_at ASC",
    )?;
    event.participants = stmt
        .query_map(params![id], |row| {
            Ok(Participant::new(row.get(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<ParticipantSet, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT user_id, display_name FROM roll_winners WHERE event_id = ?1 ORDER BY seq ASC",
    )?;
    event.winners = stmt
        .query_map(params![id], |row| {
            Ok(Participant::new(row.get(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(event)
}
