use crate::error::{Result, RollError};
use crate::participants::ParticipantSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of trailing id bytes rendered in a short id.
const SHORT_ID_BYTES: usize = 3;

/// Durable identifier of a roll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Hex of the last three bytes, the form users type in `/cancel`.
    pub fn short(&self) -> ShortId {
        let bytes = self.0.as_bytes();
        ShortId(hex::encode(&bytes[bytes.len() - SHORT_ID_BYTES..]))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for EventId {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| RollError::invalid_record(format!("Invalid event id '{}': {}", s, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortId {
    type Err = RollError;

    /// Accepts `abc123` or `#abc123`, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim().trim_start_matches('#').to_ascii_lowercase();
        if raw.len() != SHORT_ID_BYTES * 2 || hex::decode(&raw).is_err() {
            return Err(RollError::invalid_record(format!(
                "Invalid short id '{}'",
                s
            )));
        }
        Ok(Self(raw))
    }
}

/// One opt-in entry. Seeded names carry a synthetic negative id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub display_name: String,
}

impl Participant {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }

    /// Only real chat users can be mentioned.
    pub fn is_mentionable(&self) -> bool {
        self.user_id > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Chat,
    Web,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Chat => "chat",
            Source::Web => "web",
        }
    }
}

impl FromStr for Source {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chat" => Ok(Source::Chat),
            "web" => Ok(Source::Web),
            other => Err(RollError::invalid_record(format!(
                "Unknown source '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollStatus {
    Pending,
    Drawn,
    Cancelled,
}

impl RollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollStatus::Pending => "pending",
            RollStatus::Drawn => "drawn",
            RollStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, RollStatus::Pending)
    }
}

impl FromStr for RollStatus {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RollStatus::Pending),
            "drawn" => Ok(RollStatus::Drawn),
            "cancelled" => Ok(RollStatus::Cancelled),
            other => Err(RollError::invalid_record(format!(
                "Unknown status '{}'",
                other
            ))),
        }
    }
}

/// `(group, announcement message)`: how chat replies find their event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventIdentity {
    pub group_id: i64,
    pub message_id: i32,
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.message_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollEvent {
    pub id: EventId,
    pub group_id: i64,
    pub group_name: String,
    pub announcement_message_id: Option<i32>,
    pub organizer_id: i64,
    pub organizer_name: String,
    pub prize: String,
    pub draw_time: DateTime<Utc>,
    pub winner_count: u32,
    pub source: Source,
    pub status: RollStatus,
    pub participants: ParticipantSet,
    pub winners: Vec<Participant>,
}

impl RollEvent {
    pub fn new(
        group_id: i64,
        organizer: &Participant,
        prize: impl Into<String>,
        draw_time: DateTime<Utc>,
        source: Source,
    ) -> Self {
        Self {
            id: EventId::new(),
            group_id,
            group_name: String::new(),
            announcement_message_id: None,
            organizer_id: organizer.user_id,
            organizer_name: organizer.display_name.clone(),
            prize: prize.into(),
            draw_time,
            winner_count: 1,
            source,
            status: RollStatus::Pending,
            participants: ParticipantSet::new(),
            winners: Vec::new(),
        }
    }

    pub fn short_id(&self) -> ShortId {
        self.id.short()
    }

    pub fn identity(&self) -> Option<EventIdentity> {
        self.announcement_message_id.map(|message_id| EventIdentity {
            group_id: self.group_id,
            message_id,
        })
    }

    /// Requested winner count with the "zero means one" default applied.
    pub fn effective_winner_count(&self) -> usize {
        self.winner_count.max(1) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
        }
    }
}

impl FromStr for ChangeOperation {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert" => Ok(ChangeOperation::Insert),
            "update" => Ok(ChangeOperation::Update),
            other => Err(RollError::change_feed(format!(
                "Unknown operation '{}'",
                other
            ))),
        }
    }
}

/// One entry of the store's change feed: the operation and the document key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub sequence: i64,
    pub operation: ChangeOperation,
    pub event_id: EventId,
}
