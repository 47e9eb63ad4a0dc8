use crate::error::{Result, RollError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// Chat account of the bot; commands must mention it.
    pub bot_id: i64,
    /// Groups whose messages are handled and whose lotteries are resumed.
    pub groups: Vec<i64>,
    /// Users allowed to start a lottery. Empty allows everyone.
    pub admins: Vec<i64>,
    /// Also publish a group notice when a lottery is created from chat.
    pub group_notice: bool,
    /// Mention everyone in creation announcements.
    pub at_all: bool,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound of one wait on the change feed.
    pub max_await: Duration,
    /// Change log polling interval inside one wait.
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            bot_id: 0,
            groups: Vec::new(),
            admins: Vec::new(),
            group_notice: false,
            at_all: false,
            bridge: BridgeConfig::default(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_await: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RollConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let config: RollConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_monitored(&self, group_id: i64) -> bool {
        self.groups.contains(&group_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_id <= 0 {
            return Err(RollError::config("Bot account id must be set"));
        }

        if self.groups.is_empty() {
            return Err(RollError::config("At least one group must be monitored"));
        }

        self.bridge.validate()
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_await.is_zero() {
            return Err(RollError::config("Bridge max await must be greater than 0"));
        }

        if self.poll_interval.is_zero() || self.poll_interval > self.max_await {
            return Err(RollError::config(
                "Bridge poll interval must be within (0, max_await]",
            ));
        }

        if self.initial_backoff > self.max_backoff {
            return Err(RollError::config(
                "Initial backoff cannot exceed the maximum backoff",
            ));
        }

        Ok(())
    }

    /// Delay before reconnect attempt `attempt` (0-based): doubling, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid() -> RollConfig {
        RollConfig {
            bot_id: 42,
            groups: vec![1001],
            ..RollConfig::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());
        assert!(RollConfig::default().validate().is_err());

        let mut config = valid();
        config.bridge.poll_interval = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let bridge = BridgeConfig::default();
        assert_eq!(bridge.backoff(0), Duration::from_millis(500));
        assert_eq!(bridge.backoff(1), Duration::from_secs(1));
        assert_eq!(bridge.backoff(3), Duration::from_secs(4));
        assert_eq!(bridge.backoff(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rollbot.json");
        tokio::fs::write(&path, r#"{"bot_id": 7, "groups": [5], "at_all": true}"#)
            .await
            .unwrap();

        let config = RollConfig::load(&path).await.unwrap();
        assert_eq!(config.bot_id, 7);
        assert!(config.at_all);
        assert!(config.is_monitored(5));
        assert_eq!(config.bridge.max_await, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = RollConfig::load(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.bot_id, 0);
    }
}
