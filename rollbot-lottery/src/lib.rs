//! Roll lottery engine
//!
//! Schedules draws for lotteries announced in group chats, resumes them
//! after a restart, cancels them on request and picks up lotteries inserted
//! into the store by other writers.

pub mod announce;
pub mod bridge;
pub mod chat;
#[cfg(any(test, feature = "test-util"))]
pub mod chat_stub;
pub mod dispatch;
pub mod draw;
pub mod engine;
pub mod error;
pub mod request;
pub mod resume;
pub mod scheduler;

pub use bridge::{Bridge, WebAnnouncer};
pub use chat::{ChatClient, IncomingMessage, Mention, OutgoingMessage, SentMessage};
#[cfg(any(test, feature = "test-util"))]
pub use chat_stub::ChatClientStub;
pub use dispatch::{AdminGate, CreateGate, Dispatched, Dispatcher, GateDecision};
pub use draw::draw;
pub use engine::{CreatedRoll, OptIn, RollEngine};
pub use error::{LotteryError, Result};
pub use request::{parse_cancel, parse_roll, CreateRequest};
pub use resume::resume;
pub use scheduler::{RollOutcome, Scheduler};
