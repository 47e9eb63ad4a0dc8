//! Routes incoming group messages to engine operations.

use crate::announce;
use crate::chat::{ChatClient, IncomingMessage, OutgoingMessage};
use crate::engine::{CreatedRoll, OptIn, RollEngine};
use crate::request::{self, CANCEL_COMMAND, ROLL_COMMAND};
use crate::LotteryError;
use chrono::Utc;
use rollbot_core::EventIdentity;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(String),
}

/// Decides who may start a lottery.
pub trait CreateGate: Send + Sync {
    fn allow(&self, group_id: i64, user_id: i64) -> GateDecision;
}

/// Only configured admins may create lotteries. No admins means everyone may.
pub struct AdminGate {
    admins: HashSet<i64>,
}

impl AdminGate {
    pub fn new(admins: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

impl CreateGate for AdminGate {
    fn allow(&self, _group_id: i64, user_id: i64) -> GateDecision {
        if self.admins.is_empty() || self.admins.contains(&user_id) {
            GateDecision::Allow
        } else {
            GateDecision::Deny("You are not an admin and cannot start a lottery".to_string())
        }
    }
}

/// What the dispatcher did with a message.
pub enum Dispatched {
    Created(CreatedRoll),
    Cancelled { found: bool },
    OptIn(OptIn),
    Rejected,
    Invalid,
    Ignored,
}

pub struct Dispatcher {
    engine: Arc<RollEngine>,
    chat: Arc<dyn ChatClient>,
    gate: Box<dyn CreateGate>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<RollEngine>,
        chat: Arc<dyn ChatClient>,
        gate: Box<dyn CreateGate>,
    ) -> Self {
        Self { engine, chat, gate }
    }

    pub fn engine(&self) -> &Arc<RollEngine> {
        &self.engine
    }

    /// Handle one group message. Commands addressed to the bot take
    /// precedence; any other reply is treated as an opt-in.
    pub async fn handle(&self, message: &IncomingMessage) -> Dispatched {
        let config = self.engine.config();
        if !config.is_monitored(message.group_id) || message.sender.user_id == config.bot_id {
            return Dispatched::Ignored;
        }

        if message.mentions(config.bot_id) {
            match request::command_of(&message.text) {
                Some(ROLL_COMMAND) => return self.create(message).await,
                Some(CANCEL_COMMAND) => return self.cancel(message).await,
                _ => {}
            }
        }

        match message.reply_to {
            Some(reply_to) => self.opt_in(message, reply_to).await,
            None => Dispatched::Ignored,
        }
    }

    async fn create(&self, message: &IncomingMessage) -> Dispatched {
        let decision = self.gate.allow(message.group_id, message.sender.user_id);
        if let GateDecision::Deny(reason) = decision {
            tracing::info!(
                "Rejected roll from {} in group {}: {}",
                message.sender.user_id,
                message.group_id,
                reason
            );
            self.reply(message, announce::rejected(&reason)).await;
            return Dispatched::Rejected;
        }

        match request::parse_roll(&message.text, Utc::now()) {
            Ok(request) => Dispatched::Created(self.engine.create_event(message, request).await),
            Err(e) => {
                tracing::warn!("Malformed roll from {}: {}", message.sender.user_id, e);
                let reason = match &e {
                    LotteryError::InvalidDrawTime(raw) => {
                        format!("Cannot read draw time {:?}", raw)
                    }
                    other => other.to_string(),
                };
                self.reply(message, announce::usage(&reason)).await;
                Dispatched::Invalid
            }
        }
    }

    async fn cancel(&self, message: &IncomingMessage) -> Dispatched {
        match request::parse_cancel(&message.text) {
            Ok(short_id) => {
                let found = self.engine.cancel(&short_id);
                if !found {
                    self.reply(message, announce::nothing_to_cancel(short_id.as_str()))
                        .await;
                }
                Dispatched::Cancelled { found }
            }
            Err(e) => {
                tracing::warn!("Malformed cancel from {}: {}", message.sender.user_id, e);
                Dispatched::Invalid
            }
        }
    }

    async fn opt_in(&self, message: &IncomingMessage, reply_to: i32) -> Dispatched {
        let identity = EventIdentity {
            group_id: message.group_id,
            message_id: reply_to,
        };
        let outcome = self.engine.record_opt_in(&identity, &message.sender).await;
        match outcome {
            OptIn::Joined => self.reply(message, announce::joined(&message.sender)).await,
            OptIn::AlreadyJoined => {
                self.reply(message, announce::already_joined(&message.sender))
                    .await
            }
            OptIn::Closed | OptIn::NoEvent => {}
        }
        Dispatched::OptIn(outcome)
    }

    async fn reply(&self, message: &IncomingMessage, reply: OutgoingMessage) {
        if let Err(e) = self.chat.send_group_message(message.group_id, reply).await {
            tracing::error!("Failed to reply in group {}: {}", message.group_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_stub::ChatClientStub;
    use rollbot_core::{Participant, RollConfig, SqliteEventStore, Storage};
    use tempfile::{tempdir, TempDir};

    const BOT: i64 = 99;
    const GROUP: i64 = 1;

    async fn setup(admins: Vec<i64>) -> (TempDir, Arc<ChatClientStub>, Dispatcher) {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&temp_dir.path().join("rollbot.db")).await.unwrap());
        let chat = Arc::new(ChatClientStub::new());
        let config = RollConfig {
            bot_id: BOT,
            groups: vec![GROUP],
            admins: admins.clone(),
            ..RollConfig::default()
        };
        let engine = Arc::new(RollEngine::new(
            Arc::new(SqliteEventStore::new(storage)),
            chat.clone(),
            config,
        ));
        let dispatcher = Dispatcher::new(engine, chat.clone(), Box::new(AdminGate::new(admins)));
        (temp_dir, chat, dispatcher)
    }

    fn message(message_id: i32, sender: Participant, text: &str) -> IncomingMessage {
        IncomingMessage {
            group_id: GROUP,
            group_name: "skins".to_string(),
            message_id,
            sender,
            text: text.to_string(),
            reply_to: None,
            mentions: vec![BOT],
        }
    }

    fn reply(message_id: i32, sender: Participant, reply_to: i32) -> IncomingMessage {
        IncomingMessage {
            reply_to: Some(reply_to),
            mentions: Vec::new(),
            ..message(message_id, sender, "me!")
        }
    }

    #[tokio::test]
    async fn test_roll_then_reply_then_cancel() {
        let (_dir, chat, dispatcher) = setup(Vec::new()).await;
        let alice = Participant::new(7, "alice");
        let bob = Participant::new(42, "bob");

        let created = match dispatcher
            .handle(&message(10, alice.clone(), "/roll\nknife\n2099-01-01 12:00"))
            .await
        {
            Dispatched::Created(created) => created,
            _ => panic!("expected a created roll"),
        };

        assert!(matches!(
            dispatcher.handle(&reply(11, bob.clone(), 10)).await,
            Dispatched::OptIn(OptIn::Joined)
        ));
        assert!(matches!(
            dispatcher.handle(&reply(12, bob, 10)).await,
            Dispatched::OptIn(OptIn::AlreadyJoined)
        ));
        assert_eq!(chat.texts_containing("joined the lottery").len(), 1);
        assert_eq!(chat.texts_containing("already in this lottery").len(), 1);

        let cancel = format!("/cancel #{}", created.event.short_id());
        assert!(matches!(
            dispatcher.handle(&message(13, alice.clone(), &cancel)).await,
            Dispatched::Cancelled { found: true }
        ));
        assert!(matches!(
            dispatcher.handle(&message(14, alice, &cancel)).await,
            Dispatched::Cancelled { found: false }
        ));
        assert_eq!(chat.texts_containing("Nothing to cancel").len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_draw_time_gets_usage_reply() {
        let (_dir, chat, dispatcher) = setup(Vec::new()).await;
        let outcome = dispatcher
            .handle(&message(10, Participant::new(7, "alice"), "/roll\nknife\nsoon"))
            .await;

        assert!(matches!(outcome, Dispatched::Invalid));
        assert_eq!(dispatcher.engine().scheduler().armed_count(), 0);
        assert_eq!(chat.texts_containing("Usage").len(), 1);
    }

    #[tokio::test]
    async fn test_gate_and_addressing() {
        let (_dir, chat, dispatcher) = setup(vec![7]).await;

        let denied = dispatcher
            .handle(&message(10, Participant::new(8, "mallory"), "/roll\nknife\nnow"))
            .await;
        assert!(matches!(denied, Dispatched::Rejected));
        assert_eq!(chat.texts_containing("not an admin").len(), 1);

        let mut unaddressed = message(11, Participant::new(7, "alice"), "/roll\nknife\nnow");
        unaddressed.mentions.clear();
        assert!(matches!(dispatcher.handle(&unaddressed).await, Dispatched::Ignored));

        let mut elsewhere = message(12, Participant::new(7, "alice"), "/roll\nknife\nnow");
        elsewhere.group_id = 2;
        assert!(matches!(dispatcher.handle(&elsewhere).await, Dispatched::Ignored));
        assert_eq!(dispatcher.engine().scheduler().armed_count(), 0);
    }

    #[test]
    fn test_admin_gate() {
        assert_eq!(AdminGate::new(Vec::new()).allow(1, 5), GateDecision::Allow);
        let gate = AdminGate::new([1, 2]);
        assert_eq!(gate.allow(1, 2), GateDecision::Allow);
        assert!(matches!(gate.allow(1, 3), GateDecision::Deny(_)));
    }
}
