//! User-facing texts posted by the engine.

use crate::chat::{Mention, OutgoingMessage};
use chrono::{DateTime, Local, Utc};
use rollbot_core::{Participant, RollEvent, ShortId};

fn local_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%m-%d %H:%M").to_string()
}

fn with_optional_everyone(message: OutgoingMessage, at_all: bool) -> OutgoingMessage {
    if at_all {
        message.with_mention(Mention::All)
    } else {
        message
    }
}

/// Posted after a `/roll` command; replies go to the command message itself.
pub fn chat_confirmation(event: &RollEvent, at_all: bool) -> OutgoingMessage {
    let text = format!(
        "Lottery created, reply to the pinned message above to join!\n\
         Prize: {:?}\n\
         Winners: {}\n\
         Draw time: {}\n\
         Organizer: {}\n\
         Cancel with /cancel #{}",
        event.prize,
        event.effective_winner_count(),
        local_time(&event.draw_time),
        event.organizer_name,
        event.short_id(),
    );
    with_optional_everyone(OutgoingMessage::text(text), at_all)
}

/// Posted by the bridge for externally inserted events; replies to this
/// message opt in.
pub fn web_announcement(event: &RollEvent, at_all: bool) -> OutgoingMessage {
    let text = format!(
        "Lottery created (web), reply to this message to join!\n\
         Prize: {:?}\n\
         Winners: {}\n\
         Draw time: {}\n\
         Organizer: {}\n\
         Cancel with /cancel #{}",
        event.prize,
        event.effective_winner_count(),
        local_time(&event.draw_time),
        event.organizer_name,
        event.short_id(),
    );
    with_optional_everyone(OutgoingMessage::text(text), at_all)
}

pub fn group_notice(event: &RollEvent) -> String {
    format!(
        "{} is rolling {:?}\nDraw time {}\nReply to the announcement to join",
        event.organizer_name,
        event.prize,
        event
            .draw_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M %z"),
    )
}

/// Mentions the winner first when it is a real chat user.
pub fn winner(event: &RollEvent, winner: &Participant) -> OutgoingMessage {
    let message = OutgoingMessage::text(format!(
        "Congratulations {:?} (id {}) on winning {:?}!",
        winner.display_name, winner.user_id, event.prize
    ));
    if winner.is_mentionable() {
        message.with_mention(Mention::User(winner.user_id))
    } else {
        message
    }
}

pub fn cancelled(short_id: &ShortId, prize: &str) -> OutgoingMessage {
    OutgoingMessage::text(format!("Lottery #{} ({:?}) was cancelled", short_id, prize))
}

pub fn joined(participant: &Participant) -> OutgoingMessage {
    OutgoingMessage::text(format!("{} joined the lottery", participant.display_name))
}

pub fn already_joined(participant: &Participant) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "{} is already in this lottery",
        participant.display_name
    ))
}

pub fn nothing_to_cancel(short_id: &str) -> OutgoingMessage {
    OutgoingMessage::text(format!("Nothing to cancel for #{}", short_id))
}

pub fn usage(reason: &str) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "{}\nUsage:\n/roll [winner count]\n<prize>\nnow | YYYY-MM-DD HH:MM\n[participant name]...",
        reason
    ))
}

pub fn rejected(reason: &str) -> OutgoingMessage {
    OutgoingMessage::text(reason.to_string())
}
