use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DB_FILE: &str = "rollbot.db";
const CONFIG_FILE: &str = "rollbot.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rollbot");
        Self {
            config_path: data_dir.join(CONFIG_FILE),
            data_dir,
        }
    }
}

impl CliConfig {
    /// Command-line overrides win; the config file defaults to the data directory.
    pub fn resolve(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| Self::default().data_dir);
        Self {
            config_path: config_path.unwrap_or_else(|| data_dir.join(CONFIG_FILE)),
            data_dir,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_paths() {
        let config = CliConfig::resolve(Some(PathBuf::from("/tmp/rb")), None);
        assert_eq!(config.config_path, PathBuf::from("/tmp/rb/rollbot.json"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/rb/rollbot.db"));

        let config = CliConfig::resolve(
            Some(PathBuf::from("/tmp/rb")),
            Some(PathBuf::from("/etc/rollbot.json")),
        );
        assert_eq!(config.config_path, PathBuf::from("/etc/rollbot.json"));
    }
}
