//! Stdin/stdout stand-in for a chat network.
//!
//! One incoming message per line:
//!
//! ```text
//! <group> <user_id> <name> [@<id>]... [^<reply_id>] <text>
//! ```
//!
//! `\n` in the text stands for a line break.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rollbot_core::Participant;
use rollbot_lottery::{ChatClient, IncomingMessage, Mention, OutgoingMessage, SentMessage};
use std::sync::atomic::{AtomicI32, Ordering};

pub struct ConsoleChat {
    next_message_id: AtomicI32,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI32::new(1),
        }
    }

    fn next_message_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Parse a console line into a message with a fresh message id.
    pub fn parse_line(&self, line: &str) -> anyhow::Result<IncomingMessage> {
        let (group, rest) = next_token(line).ok_or_else(|| anyhow!("missing group id"))?;
        let group_id: i64 = group
            .parse()
            .with_context(|| format!("invalid group id '{}'", group))?;

        let (user, rest) = next_token(rest).ok_or_else(|| anyhow!("missing user id"))?;
        let user_id: i64 = user
            .parse()
            .with_context(|| format!("invalid user id '{}'", user))?;

        let (name, mut rest) = next_token(rest).ok_or_else(|| anyhow!("missing user name"))?;

        let mut mentions = Vec::new();
        let mut reply_to = None;
        while let Some((token, after)) = next_token(rest) {
            if let Some(id) = token.strip_prefix('@') {
                mentions.push(
                    id.parse::<i64>()
                        .with_context(|| format!("invalid mention '{}'", token))?,
                );
            } else if let Some(id) = token.strip_prefix('^') {
                reply_to = Some(
                    id.parse::<i32>()
                        .with_context(|| format!("invalid reply target '{}'", token))?,
                );
            } else {
                break;
            }
            rest = after;
        }

        Ok(IncomingMessage {
            group_id,
            group_name: format!("group-{}", group_id),
            message_id: self.next_message_id(),
            sender: Participant::new(user_id, name),
            text: rest.trim().replace("\\n", "\n"),
            reply_to,
            mentions,
        })
    }
}

fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    Some(input.split_once(char::is_whitespace).unwrap_or((input, "")))
}

#[async_trait]
impl ChatClient for ConsoleChat {
    async fn send_group_message(
        &self,
        group_id: i64,
        message: OutgoingMessage,
    ) -> rollbot_lottery::Result<SentMessage> {
        let message_id = self.next_message_id();
        let mention = match message.mention {
            Some(Mention::All) => "@all ".to_string(),
            Some(Mention::User(user_id)) => format!("@{} ", user_id),
            None => String::new(),
        };
        println!("[group {}] #{} {}{}", group_id, message_id, mention, message.text);
        Ok(SentMessage {
            group_id,
            message_id,
        })
    }

    async fn set_essence(&self, group_id: i64, message_id: i32) -> rollbot_lottery::Result<()> {
        println!("[group {}] pinned #{}", group_id, message_id);
        Ok(())
    }

    async fn add_group_notice(&self, group_id: i64, text: &str) -> rollbot_lottery::Result<()> {
        println!("[group {}] notice: {}", group_id, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let chat = ConsoleChat::new();
        let message = chat
            .parse_line("1001 7 alice @99 /roll 2\\nAWP\\nnow\\nbob")
            .unwrap();

        assert_eq!(message.group_id, 1001);
        assert_eq!(message.sender, Participant::new(7, "alice"));
        assert_eq!(message.mentions, vec![99]);
        assert_eq!(message.reply_to, None);
        assert_eq!(message.text, "/roll 2\nAWP\nnow\nbob");
    }

    #[test]
    fn test_parse_reply_and_ids() {
        let chat = ConsoleChat::new();
        let first = chat.parse_line("1001 42 bob ^1 me too").unwrap();
        let second = chat.parse_line("1001 43 carol ^1").unwrap();

        assert_eq!(first.reply_to, Some(1));
        assert_eq!(first.text, "me too");
        assert_eq!(second.text, "");
        assert_ne!(first.message_id, second.message_id);
    }

    #[test]
    fn test_parse_errors() {
        let chat = ConsoleChat::new();
        assert!(chat.parse_line("").is_err());
        assert!(chat.parse_line("abc 7 alice hi").is_err());
        assert!(chat.parse_line("1001 7").is_err());
        assert!(chat.parse_line("1001 7 alice @x hi").is_err());
    }
}
