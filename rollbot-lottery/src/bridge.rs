//! Turns externally inserted events into announced, scheduled draws.

use crate::announce;
use crate::chat::ChatClient;
use crate::scheduler::{RollOutcome, Scheduler};
use rollbot_core::{
    BridgeConfig, ChangeEvent, ChangeFeed, ChangeOperation, EventStore, RollEvent, Source,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Posts, pins and back-fills the announcement of a web-sourced event.
#[derive(Clone)]
pub struct WebAnnouncer {
    store: Arc<dyn EventStore>,
    chat: Arc<dyn ChatClient>,
    at_all: bool,
}

impl WebAnnouncer {
    pub fn new(store: Arc<dyn EventStore>, chat: Arc<dyn ChatClient>, at_all: bool) -> Self {
        Self {
            store,
            chat,
            at_all,
        }
    }

    /// Web-sourced and not yet announced.
    pub fn needs_announcement(event: &RollEvent) -> bool {
        event.source == Source::Web && event.announcement_message_id.is_none()
    }

    /// Announce `event` and record the announcement id on it and in the
    /// store. A failed send leaves the event without an announcement.
    pub async fn announce(&self, event: &mut RollEvent) {
        match self
            .chat
            .send_group_message(event.group_id, announce::web_announcement(event, self.at_all))
            .await
        {
            Ok(sent) => {
                if let Err(e) = self.chat.set_essence(sent.group_id, sent.message_id).await {
                    tracing::warn!("Failed to pin announcement of roll {}: {}", event.id, e);
                }
                self.store.set_announcement(&event.id, sent.message_id).await;
                event.announcement_message_id = Some(sent.message_id);
            }
            Err(e) => {
                tracing::error!("Failed to announce web roll {}: {}", event.id, e);
            }
        }
    }
}

#[derive(Clone)]
pub struct Bridge {
    feed: Arc<dyn ChangeFeed>,
    announcer: WebAnnouncer,
    scheduler: Scheduler,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        announcer: WebAnnouncer,
        scheduler: Scheduler,
        config: BridgeConfig,
    ) -> Self {
        Self {
            feed,
            announcer,
            scheduler,
            config,
        }
    }

    /// Watch the change feed until `shutdown` fires, resubscribing after
    /// every failure. Inserts made while disconnected are not replayed.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut attempt = 0u32;

        'subscribe: loop {
            let mut stream = match self.feed.watch(&[ChangeOperation::Insert]).await {
                Ok(stream) => {
                    attempt = 0;
                    stream
                }
                Err(e) => {
                    tracing::error!("Failed to open roll change feed: {}", e);
                    if !self.back_off(&mut attempt, &shutdown).await {
                        break 'subscribe;
                    }
                    continue 'subscribe;
                }
            };
            tracing::info!("Bridge watching for web-sourced rolls");

            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => {
                        stream.close().await;
                        break 'subscribe;
                    }
                    next = stream.next(self.config.max_await) => next,
                };

                match next {
                    Ok(Some(change)) => {
                        let bridge = self.clone();
                        tokio::spawn(async move {
                            bridge.handle_insert(&change).await;
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("Roll change feed failed: {}", e);
                        stream.close().await;
                        if !self.back_off(&mut attempt, &shutdown).await {
                            break 'subscribe;
                        }
                        continue 'subscribe;
                    }
                }
            }
        }

        tracing::info!("Bridge stopped");
    }

    /// Announce an externally inserted event, back-fill its announcement id
    /// and arm it. Anything not web-sourced or already announced is ignored.
    pub async fn handle_insert(&self, change: &ChangeEvent) -> Option<JoinHandle<RollOutcome>> {
        // Re-read rather than trusting the feed payload
        let mut event = self.announcer.store.find_by_id(&change.event_id).await?;
        if !WebAnnouncer::needs_announcement(&event) {
            tracing::debug!(
                "Ignoring {} roll {} (seq {})",
                event.source.as_str(),
                event.id,
                change.sequence
            );
            return None;
        }
        tracing::info!("New web-sourced roll {} in group {}", event.id, event.group_id);

        self.announcer.announce(&mut event).await;
        self.scheduler.arm(event)
    }

    /// Sleep the next backoff step. `false` if shutdown came first.
    async fn back_off(&self, attempt: &mut u32, shutdown: &CancellationToken) -> bool {
        let delay = self.config.backoff(*attempt);
        *attempt = attempt.saturating_add(1);
        tracing::warn!("Reconnecting roll change feed in {:?}", delay);

        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_stub::ChatClientStub;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use rollbot_core::{
        ChangeStream, EventId, Participant, RollError, RollEvent, SqliteEventStore, Storage,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    /// Feed whose streams replay scripted results, then time out forever.
    struct ScriptedFeed {
        scripts: Mutex<VecDeque<Vec<rollbot_core::Result<Option<ChangeEvent>>>>>,
        opened: AtomicU32,
    }

    struct ScriptedStream {
        items: VecDeque<rollbot_core::Result<Option<ChangeEvent>>>,
    }

    #[async_trait]
    impl ChangeFeed for ScriptedFeed {
        async fn watch(
            &self,
            _operations: &[ChangeOperation],
        ) -> rollbot_core::Result<Box<dyn ChangeStream>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let items = self.scripts.lock().pop_front().unwrap_or_default();
            Ok(Box::new(ScriptedStream {
                items: items.into(),
            }))
        }
    }

    #[async_trait]
    impl ChangeStream for ScriptedStream {
        async fn next(&mut self, max_await: Duration) -> rollbot_core::Result<Option<ChangeEvent>> {
            match self.items.pop_front() {
                Some(item) => item,
                None => {
                    tokio::time::sleep(max_await).await;
                    Ok(None)
                }
            }
        }

        async fn close(&mut self) {}
    }

    async fn setup(
        feed: Arc<dyn ChangeFeed>,
    ) -> (TempDir, Arc<SqliteEventStore>, Arc<ChatClientStub>, Bridge) {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&temp_dir.path().join("rollbot.db")).await.unwrap());
        let store = Arc::new(SqliteEventStore::new(storage));
        let chat = Arc::new(ChatClientStub::new());
        let scheduler = Scheduler::new(store.clone(), chat.clone());
        let announcer = WebAnnouncer::new(store.clone(), chat.clone(), false);
        let bridge = Bridge::new(feed, announcer, scheduler, BridgeConfig::default());
        (temp_dir, store, chat, bridge)
    }

    fn change(event_id: EventId) -> ChangeEvent {
        ChangeEvent {
            sequence: 1,
            operation: ChangeOperation::Insert,
            event_id,
        }
    }

    fn empty_feed() -> Arc<ScriptedFeed> {
        Arc::new(ScriptedFeed {
            scripts: Mutex::new(VecDeque::new()),
            opened: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_web_insert_is_announced_and_armed() {
        let (_dir, store, chat, bridge) = setup(empty_feed()).await;
        let organizer = Participant::new(7, "alice");
        let event = RollEvent::new(1, &organizer, "gloves", Utc::now(), Source::Web);
        store.insert(&event).await;

        let handle = bridge.handle_insert(&change(event.id)).await.unwrap();
        handle.await.unwrap();

        let stored = store.find_by_id(&event.id).await.unwrap();
        let message_id = stored.announcement_message_id.unwrap();
        assert_eq!(chat.essences.lock().clone(), vec![(1, message_id)]);
        assert_eq!(chat.texts_containing("gloves").len(), 1);

        // Already announced: a replayed insert does nothing
        assert!(bridge.handle_insert(&change(event.id)).await.is_none());
    }

    #[tokio::test]
    async fn test_chat_inserts_are_ignored() {
        let (_dir, store, chat, bridge) = setup(empty_feed()).await;
        let organizer = Participant::new(7, "alice");
        let event = RollEvent::new(1, &organizer, "gloves", Utc::now(), Source::Chat);
        store.insert(&event).await;

        assert!(bridge.handle_insert(&change(event.id)).await.is_none());
        assert!(bridge.handle_insert(&change(EventId::new())).await.is_none());
        assert!(chat.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_stream_error() {
        let feed = empty_feed();
        feed.scripts
            .lock()
            .push_back(vec![Err(RollError::change_feed("connection reset"))]);
        let (_dir, _store, _chat, bridge) = setup(feed.clone()).await;

        let shutdown = CancellationToken::new();
        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { bridge.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(feed.opened.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        task.await.unwrap();
    }
}
