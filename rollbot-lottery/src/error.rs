use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Roll core error: {0}")]
    RollCore(#[from] rollbot_core::RollError),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid draw time '{0}', expected 'now' or YYYY-MM-DD HH:MM")]
    InvalidDrawTime(String),

    #[error("Chat transport error: {0}")]
    Chat(String),
}

impl LotteryError {
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    pub fn chat(msg: impl Into<String>) -> Self {
        Self::Chat(msg.into())
    }
}
