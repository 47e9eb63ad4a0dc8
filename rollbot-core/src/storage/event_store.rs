use crate::error::Result;
use crate::storage::{RollStore, Storage};
use crate::types::{EventId, EventIdentity, Participant, RollEvent, RollStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence contract of the lottery engine.
///
/// Writes are at-most-once: a failing write is logged and dropped, the
/// caller carries on with what it already did in memory. Lookups fail open
/// and report `None`. Only `find_pending` surfaces errors, since startup
/// cannot decide what to resume without it.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: &RollEvent) -> EventId;

    async fn find_by_identity(&self, identity: &EventIdentity) -> Option<RollEvent>;

    async fn find_by_id(&self, id: &EventId) -> Option<RollEvent>;

    async fn add_participant(&self, identity: &EventIdentity, participant: &Participant);

    async fn add_winner(&self, id: &EventId, winner: &Participant);

    async fn find_pending(&self, group_id: i64, now: DateTime<Utc>) -> Result<Vec<RollEvent>>;

    async fn set_announcement(&self, id: &EventId, message_id: i32);

    async fn set_status(&self, id: &EventId, status: RollStatus);
}

pub struct SqliteEventStore {
    storage: Arc<Storage>,
}

impl SqliteEventStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn rolls(&self) -> RollStore<'_> {
        RollStore::new(&self.storage)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &RollEvent) -> EventId {
        if let Err(e) = self.rolls().insert_event(event).await {
            tracing::error!("Failed to persist roll event {}: {}", event.id, e);
        }
        event.id
    }

    async fn find_by_identity(&self, identity: &EventIdentity) -> Option<RollEvent> {
        match self.rolls().load_event_by_identity(identity).await {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to get roll event {}: {}", identity, e);
                None
            }
        }
    }

    async fn find_by_id(&self, id: &EventId) -> Option<RollEvent> {
        match self.rolls().load_event(id).await {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to get roll event {}: {}", id, e);
                None
            }
        }
    }

    async fn add_participant(&self, identity: &EventIdentity, participant: &Participant) {
        match self.rolls().insert_participant(identity, participant).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                "Participant {} not added to {} (present or no such event)",
                participant.user_id,
                identity
            ),
            Err(e) => tracing::error!("Failed to append participant to {}: {}", identity, e),
        }
    }

    async fn add_winner(&self, id: &EventId, winner: &Participant) {
        if let Err(e) = self.rolls().insert_winner(id, winner).await {
            tracing::error!("Failed to record winner {} for {}: {}", winner.user_id, id, e);
        }
    }

    async fn find_pending(&self, group_id: i64, now: DateTime<Utc>) -> Result<Vec<RollEvent>> {
        self.rolls().load_pending(group_id, now).await
    }

    async fn set_announcement(&self, id: &EventId, message_id: i32) {
        match self.rolls().set_announcement(id, message_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("No roll event {} to attach message {} to", id, message_id),
            Err(e) => tracing::error!("Failed to set announcement of {}: {}", id, e),
        }
    }

    async fn set_status(&self, id: &EventId, status: RollStatus) {
        match self.rolls().set_status(id, status).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("No roll event {} to mark {}", id, status.as_str()),
            Err(e) => tracing::error!("Failed to mark {} as {}: {}", id, status.as_str(), e),
        }
    }
}
