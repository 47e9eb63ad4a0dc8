//! Boundary to the chat protocol. The engine only needs to post messages,
//! pin them and publish group notices; everything else belongs to the adapter.

use crate::Result;
use async_trait::async_trait;
use rollbot_core::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mention {
    All,
    User(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub mention: Option<Mention>,
    pub text: String,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mention: None,
            text: text.into(),
        }
    }

    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.mention = Some(mention);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub group_id: i64,
    pub message_id: i32,
}

/// A group message as handed over by the adapter, already flattened to text.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub group_id: i64,
    pub group_name: String,
    pub message_id: i32,
    pub sender: Participant,
    pub text: String,
    /// Target of the reply element, if the message is a reply.
    pub reply_to: Option<i32>,
    /// Accounts mentioned in the message.
    pub mentions: Vec<i64>,
}

impl IncomingMessage {
    pub fn mentions(&self, user_id: i64) -> bool {
        self.mentions.contains(&user_id)
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_group_message(
        &self,
        group_id: i64,
        message: OutgoingMessage,
    ) -> Result<SentMessage>;

    /// Pin a message as a group "essence" message.
    async fn set_essence(&self, group_id: i64, message_id: i32) -> Result<()>;

    async fn add_group_notice(&self, group_id: i64, text: &str) -> Result<()>;
}
