use crate::announce;
use crate::chat::ChatClient;
use crate::draw::draw;
use parking_lot::Mutex;
use rollbot_core::{EventId, EventStore, Participant, RollEvent, RollStatus, ShortId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// How an armed event ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollOutcome {
    Fired { winners: Vec<Participant> },
    Cancelled,
}

struct ArmedEntry {
    event_id: EventId,
    token: CancellationToken,
}

/// Live timers keyed by short id. Whoever removes an entry first (the
/// timer or `cancel`) decides the outcome of that event.
#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<ShortId, ArmedEntry>>,
}

impl Registry {
    /// Remove the entry if it still belongs to `event_id`.
    fn settle(&self, short_id: &ShortId, event_id: &EventId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(short_id) {
            Some(entry) if entry.event_id == *event_id => {
                entries.remove(short_id);
                true
            }
            _ => false,
        }
    }
}

/// Delayed draws with explicit cancellation.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn EventStore>,
    chat: Arc<dyn ChatClient>,
    registry: Arc<Registry>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn EventStore>, chat: Arc<dyn ChatClient>) -> Self {
        Self {
            store,
            chat,
            registry: Arc::new(Registry::default()),
        }
    }

    /// Arm a draw at `event.draw_time`. A time in the past fires immediately.
    ///
    /// Returns `None` if the event is already settled or already armed.
    pub fn arm(&self, event: RollEvent) -> Option<JoinHandle<RollOutcome>> {
        if event.status.is_settled() {
            tracing::debug!("Not arming {} roll {}", event.status.as_str(), event.id);
            return None;
        }

        let short_id = event.short_id();
        let token = CancellationToken::new();
        {
            let mut entries = self.registry.entries.lock();
            if let Some(existing) = entries.get(&short_id) {
                if existing.event_id == event.id {
                    tracing::debug!("Roll #{} is already armed", short_id);
                    return None;
                }
                tracing::warn!(
                    "Short id collision on #{}: {} replaces {} for cancellation",
                    short_id,
                    event.id,
                    existing.event_id
                );
            }
            entries.insert(
                short_id.clone(),
                ArmedEntry {
                    event_id: event.id,
                    token: token.clone(),
                },
            );
        }

        let delay = (event.draw_time - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let deadline = Instant::now() + delay;
        tracing::info!(
            "Armed roll #{} for {:?} in {:?} (group {})",
            short_id,
            event.prize,
            delay,
            event.group_id
        );

        let scheduler = self.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => scheduler.on_cancelled(&event).await,
                _ = sleep_until(deadline) => scheduler.on_elapsed(&event, &token).await,
            }
        }))
    }

    /// Cancel the armed event with this short id. `false` means nothing was
    /// armed under it, either because it never existed or already fired.
    pub fn cancel(&self, short_id: &ShortId) -> bool {
        match self.registry.entries.lock().remove(short_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => {
                tracing::debug!("Nothing to cancel for #{}", short_id);
                false
            }
        }
    }

    pub fn armed_count(&self) -> usize {
        self.registry.entries.lock().len()
    }

    pub fn is_armed(&self, short_id: &ShortId) -> bool {
        self.registry.entries.lock().contains_key(short_id)
    }

    /// The timer went off. A displaced entry still fires; one that `cancel`
    /// removed after the timer but before the settle is cancelled.
    async fn on_elapsed(&self, event: &RollEvent, token: &CancellationToken) -> RollOutcome {
        if self.registry.settle(&event.short_id(), &event.id) || !token.is_cancelled() {
            self.on_fired(event).await
        } else {
            self.on_cancelled(event).await
        }
    }

    async fn on_fired(&self, armed: &RollEvent) -> RollOutcome {
        // Opt-ins may have landed since the event was armed
        let event = match self.store.find_by_id(&armed.id).await {
            Some(event) => event,
            None => {
                tracing::warn!("Roll {} vanished before its draw", armed.id);
                return RollOutcome::Fired {
                    winners: Vec::new(),
                };
            }
        };

        let snapshot = event.participants.snapshot();
        let winners = draw(&snapshot, event.winner_count, &mut rand::thread_rng());
        if winners.is_empty() {
            tracing::info!("Roll #{} drew no winners, nobody joined", event.short_id());
        }

        for winner in &winners {
            tracing::info!(
                "Roll #{} winner: {} ({})",
                event.short_id(),
                winner.display_name,
                winner.user_id
            );
            self.store.add_winner(&event.id, winner).await;
            if let Err(e) = self
                .chat
                .send_group_message(event.group_id, announce::winner(&event, winner))
                .await
            {
                tracing::error!("Failed to announce winner of roll {}: {}", event.id, e);
            }
        }

        self.store.set_status(&event.id, RollStatus::Drawn).await;
        RollOutcome::Fired { winners }
    }

    async fn on_cancelled(&self, event: &RollEvent) -> RollOutcome {
        let short_id = event.short_id();
        tracing::info!("Roll #{} cancelled", short_id);

        self.store.set_status(&event.id, RollStatus::Cancelled).await;
        if let Err(e) = self
            .chat
            .send_group_message(event.group_id, announce::cancelled(&short_id, &event.prize))
            .await
        {
            tracing::error!("Failed to announce cancellation of roll {}: {}", event.id, e);
        }
        RollOutcome::Cancelled
    }
}
