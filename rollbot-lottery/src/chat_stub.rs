use crate::chat::{ChatClient, OutgoingMessage, SentMessage};
use crate::{LotteryError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// In-memory chat client that records everything the engine posts.
pub struct ChatClientStub {
    pub sent: Mutex<Vec<(i64, OutgoingMessage)>>,
    pub essences: Mutex<Vec<(i64, i32)>>,
    pub notices: Mutex<Vec<(i64, String)>>,
    /// Makes every send fail, to exercise transport failures
    pub fail_sends: AtomicBool,
    next_message_id: AtomicI32,
}

impl Default for ChatClientStub {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            essences: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            next_message_id: AtomicI32::new(1000),
        }
    }
}

impl ChatClientStub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.text.clone()).collect()
    }

    pub fn texts_containing(&self, needle: &str) -> Vec<String> {
        self.texts()
            .into_iter()
            .filter(|text| text.contains(needle))
            .collect()
    }
}

#[async_trait]
impl ChatClient for ChatClientStub {
    async fn send_group_message(
        &self,
        group_id: i64,
        message: OutgoingMessage,
    ) -> Result<SentMessage> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(LotteryError::chat("stub send failure"));
        }

        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push((group_id, message));
        Ok(SentMessage {
            group_id,
            message_id,
        })
    }

    async fn set_essence(&self, group_id: i64, message_id: i32) -> Result<()> {
        self.essences.lock().push((group_id, message_id));
        Ok(())
    }

    async fn add_group_notice(&self, group_id: i64, text: &str) -> Result<()> {
        self.notices.lock().push((group_id, text.to_string()));
        Ok(())
    }
}
