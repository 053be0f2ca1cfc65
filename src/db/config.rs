use std::path::PathBuf;
use std::time::Duration;

use crate::config::{env_u32, env_u64};

const APP_DIR: &str = "adaptive-engine";
const DB_FILE: &str = "engine.db";
const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl DbConfig {
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| format!("sqlite:{}?mode=rwc", default_db_path().display()));

        Self {
            url,
            max_connections: env_u32("DB_MAX_CONNECTIONS", 5).max(1),
            busy_timeout: Duration::from_millis(env_u64("SQLITE_BUSY_TIMEOUT_MS", 30_000)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn for_path(path: &std::path::Path) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.display()),
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
        }
    }

    /// An in-memory database lives and dies with its single connection.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        if self.is_memory() {
            return None;
        }
        let raw = self
            .url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = raw.split('?').next().unwrap_or(raw);
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_detection() {
        assert!(DbConfig::in_memory().is_memory());
        assert_eq!(DbConfig::in_memory().file_path(), None);
    }

    #[test]
    fn test_file_path_extraction() {
        let config = DbConfig::for_path(std::path::Path::new("/tmp/engine/test.db"));
        assert!(!config.is_memory());
        assert_eq!(config.file_path(), Some(PathBuf::from("/tmp/engine/test.db")));
    }
}
