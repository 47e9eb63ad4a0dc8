use crate::announce;
use crate::bridge::{Bridge, WebAnnouncer};
use crate::chat::{ChatClient, IncomingMessage};
use crate::request::CreateRequest;
use crate::resume::resume;
use crate::scheduler::{RollOutcome, Scheduler};
use crate::Result;
use chrono::{DateTime, Utc};
use rollbot_core::{
    ChangeFeed, EventIdentity, EventStore, Participant, RollConfig, RollEvent, ShortId, Source,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of an opt-in reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptIn {
    Joined,
    AlreadyJoined,
    /// The event was already drawn or cancelled.
    Closed,
    NoEvent,
}

pub struct CreatedRoll {
    pub event: RollEvent,
    pub draw: Option<JoinHandle<RollOutcome>>,
}

/// Plain operations of the lottery, driven by a chat adapter.
pub struct RollEngine {
    store: Arc<dyn EventStore>,
    chat: Arc<dyn ChatClient>,
    scheduler: Scheduler,
    announcer: WebAnnouncer,
    config: RollConfig,
}

impl RollEngine {
    pub fn new(store: Arc<dyn EventStore>, chat: Arc<dyn ChatClient>, config: RollConfig) -> Self {
        let scheduler = Scheduler::new(store.clone(), chat.clone());
        let announcer = WebAnnouncer::new(store.clone(), chat.clone(), config.at_all);
        Self {
            store,
            chat,
            scheduler,
            announcer,
            config,
        }
    }

    pub fn config(&self) -> &RollConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create a lottery from a `/roll` message. The command message becomes
    /// the announcement, so replies to it opt in.
    pub async fn create_event(
        &self,
        message: &IncomingMessage,
        request: CreateRequest,
    ) -> CreatedRoll {
        let mut event = RollEvent::new(
            message.group_id,
            &message.sender,
            request.prize,
            request.draw_time,
            Source::Chat,
        );
        event.group_name = message.group_name.clone();
        event.announcement_message_id = Some(message.message_id);
        event.winner_count = request.winner_count;
        for seed in request.seeds {
            event.participants.add(seed);
        }

        self.store.insert(&event).await;
        tracing::info!(
            "Roll #{} created by {} in group {}: {:?} with {} seeded participants",
            event.short_id(),
            event.organizer_name,
            event.group_id,
            event.prize,
            event.participants.size()
        );

        if let Err(e) = self
            .chat
            .send_group_message(
                event.group_id,
                announce::chat_confirmation(&event, self.config.at_all),
            )
            .await
        {
            tracing::error!("Failed to confirm roll {}: {}", event.id, e);
        }
        if let Err(e) = self.chat.set_essence(message.group_id, message.message_id).await {
            tracing::warn!("Failed to pin roll message {}: {}", message.message_id, e);
        }
        if self.config.group_notice {
            if let Err(e) = self
                .chat
                .add_group_notice(event.group_id, &announce::group_notice(&event))
                .await
            {
                tracing::error!("Failed to add group notice for roll {}: {}", event.id, e);
            }
        }

        let draw = self.scheduler.arm(event.clone());
        CreatedRoll { event, draw }
    }

    /// Register `participant` on the event announced at `identity`.
    pub async fn record_opt_in(
        &self,
        identity: &EventIdentity,
        participant: &Participant,
    ) -> OptIn {
        let event = match self.store.find_by_identity(identity).await {
            Some(event) => event,
            None => return OptIn::NoEvent,
        };

        if event.status.is_settled() {
            tracing::debug!(
                "{} replied to {} roll #{}",
                participant.display_name,
                event.status.as_str(),
                event.short_id()
            );
            return OptIn::Closed;
        }

        if !event.participants.add(participant.clone()) {
            tracing::info!(
                "{} already in roll #{}",
                participant.display_name,
                event.short_id()
            );
            return OptIn::AlreadyJoined;
        }

        self.store.add_participant(identity, participant).await;
        tracing::info!(
            "Added participant {} to roll #{}, now {} participants",
            participant.display_name,
            event.short_id(),
            event.participants.size()
        );
        OptIn::Joined
    }

    pub fn cancel(&self, short_id: &ShortId) -> bool {
        self.scheduler.cancel(short_id)
    }

    /// Re-arm the pending events of every monitored group, announcing web
    /// events that arrived while the bridge was not running.
    pub async fn resume(&self, now: DateTime<Utc>) -> Result<usize> {
        resume(
            &self.scheduler,
            &self.announcer,
            self.store.as_ref(),
            &self.config.groups,
            now,
        )
        .await
    }

    pub fn bridge(&self, feed: Arc<dyn ChangeFeed>) -> Bridge {
        Bridge::new(
            feed,
            self.announcer.clone(),
            self.scheduler.clone(),
            self.config.bridge.clone(),
        )
    }

    pub fn spawn_bridge(
        &self,
        feed: Arc<dyn ChangeFeed>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let bridge = self.bridge(feed);
        tokio::spawn(async move { bridge.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_stub::ChatClientStub;
    use rollbot_core::{RollStatus, SqliteEventStore, Storage};
    use tempfile::{tempdir, TempDir};

    async fn setup(config: RollConfig) -> (TempDir, Arc<ChatClientStub>, RollEngine) {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&temp_dir.path().join("rollbot.db")).await.unwrap());
        let chat = Arc::new(ChatClientStub::new());
        let store = Arc::new(SqliteEventStore::new(storage));
        let engine = RollEngine::new(store, chat.clone(), config);
        (temp_dir, chat, engine)
    }

    fn roll_message() -> IncomingMessage {
        IncomingMessage {
            group_id: 1,
            group_name: "skins".to_string(),
            message_id: 500,
            sender: Participant::new(7, "alice"),
            text: String::new(),
            reply_to: None,
            mentions: Vec::new(),
        }
    }

    fn request(draw_time: DateTime<Utc>) -> CreateRequest {
        CreateRequest {
            winner_count: 1,
            prize: "knife".to_string(),
            draw_time,
            seeds: vec![Participant::new(-3, "carol")],
        }
    }

    #[tokio::test]
    async fn test_create_event_confirms_and_pins() {
        let config = RollConfig {
            group_notice: true,
            ..RollConfig::default()
        };
        let (_dir, chat, engine) = setup(config).await;
        let created = engine
            .create_event(&roll_message(), request(Utc::now() + chrono::Duration::hours(1)))
            .await;

        assert_eq!(created.event.announcement_message_id, Some(500));
        assert_eq!(created.event.group_name, "skins");
        assert!(created.draw.is_some());
        assert_eq!(
            chat.texts_containing(created.event.short_id().as_str()).len(),
            1
        );
        assert_eq!(chat.essences.lock().clone(), vec![(1, 500)]);
        assert_eq!(chat.notices.lock().len(), 1);

        assert!(engine.cancel(&created.event.short_id()));
    }

    #[tokio::test]
    async fn test_opt_in_outcomes() {
        let (_dir, _chat, engine) = setup(RollConfig::default()).await;
        let identity = EventIdentity {
            group_id: 1,
            message_id: 500,
        };
        let bob = Participant::new(42, "bob");
        assert_eq!(engine.record_opt_in(&identity, &bob).await, OptIn::NoEvent);

        let created = engine
            .create_event(&roll_message(), request(Utc::now() + chrono::Duration::hours(1)))
            .await;
        assert_eq!(engine.record_opt_in(&identity, &bob).await, OptIn::Joined);
        assert_eq!(engine.record_opt_in(&identity, &bob).await, OptIn::AlreadyJoined);

        assert!(engine.cancel(&created.event.short_id()));
        created.draw.unwrap().await.unwrap();
        let late = Participant::new(43, "dave");
        assert_eq!(engine.record_opt_in(&identity, &late).await, OptIn::Closed);

        let stored = engine.store.find_by_id(&created.event.id).await.unwrap();
        assert_eq!(stored.status, RollStatus::Cancelled);
        assert_eq!(stored.participants.size(), 2);
    }
}
