//! Configuration loading and management
//!
//! Handles parsing of `.taskboard.toml` configuration files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::model::{Priority, Status};
use crate::presenter::Layout;
use crate::remote::file::DEFAULT_POLL_INTERVAL_MS;
use crate::view::{SortKey, SortOrder, SortState};

pub const CONFIG_FILE: &str = ".taskboard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store directory; the platform data dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub feed: FeedConfig,
}

/// Initial dashboard view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_sort_key")]
    pub sort_key: String,

    #[serde(default = "default_sort_order")]
    pub sort_order: String,

    /// "month" (current calendar month) or "all"
    #[serde(default = "default_date_range")]
    pub date_range: String,

    #[serde(default = "default_layout")]
    pub layout: String,
}

fn default_sort_key() -> String {
    "promise_date".to_string()
}

fn default_sort_order() -> String {
    "asc".to_string()
}

fn default_date_range() -> String {
    "month".to_string()
}

fn default_layout() -> String {
    "list".to_string()
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sort_key: default_sort_key(),
            sort_order: default_sort_order(),
            date_range: default_date_range(),
            layout: default_layout(),
        }
    }
}

/// Defaults for new tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default = "default_priority")]
    pub default_priority: String,

    #[serde(default = "default_status")]
    pub default_status: String,

    /// Default promise date is today plus this many days
    #[serde(default = "default_promise_days")]
    pub promise_days: u32,
}

fn default_priority() -> String {
    "Medium".to_string()
}

fn default_status() -> String {
    "Pending".to_string()
}

fn default_promise_days() -> u32 {
    2
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            default_status: default_status(),
            promise_days: default_promise_days(),
        }
    }
}

/// Change feed and store locking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Default assigned-date window of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    CurrentMonth,
    All,
}

impl Config {
    /// Load configuration from a `.taskboard.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.taskboard.toml` from `dir`, or return defaults
    ///
    /// An unreadable or invalid file is reported and ignored.
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured store directory, else the platform data directory.
    pub fn store_dir(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_store_dir)
    }

    pub fn sort_state(&self) -> Result<SortState> {
        Ok(SortState {
            key: self.view.sort_key.parse::<SortKey>()?,
            order: self.view.sort_order.parse::<SortOrder>()?,
        })
    }

    pub fn date_range(&self) -> Result<DateRange> {
        match self.view.date_range.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(DateRange::CurrentMonth),
            "all" => Ok(DateRange::All),
            other => Err(Error::InvalidConfig(format!(
                "view.date_range: invalid value '{other}' (expected month|all)"
            ))),
        }
    }

    pub fn layout(&self) -> Result<Layout> {
        self.view.layout.parse()
    }

    pub fn default_priority(&self) -> Result<Priority> {
        self.tasks.default_priority.parse()
    }

    pub fn default_status(&self) -> Result<Status> {
        self.tasks.default_status.parse()
    }

    pub fn validate(&self) -> Result<()> {
        let field = |name: &str, err: Error| Error::InvalidConfig(format!("{name}: {err}"));

        self.view
            .sort_key
            .parse::<SortKey>()
            .map_err(|e| field("view.sort_key", e))?;
        self.view
            .sort_order
            .parse::<SortOrder>()
            .map_err(|e| field("view.sort_order", e))?;
        self.date_range()?;
        self.layout().map_err(|e| field("view.layout", e))?;
        self.default_priority()
            .map_err(|e| field("tasks.default_priority", e))?;
        self.default_status()
            .map_err(|e| field("tasks.default_status", e))?;

        if self.tasks.promise_days > 365 {
            return Err(Error::InvalidConfig(
                "tasks.promise_days must be <= 365".to_string(),
            ));
        }
        if self.feed.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "feed.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.feed.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "feed.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(store) = &self.store {
            if store.as_os_str().is_empty() {
                return Err(Error::InvalidConfig("store cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

fn default_store_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "taskboard")
        .map(|dirs| dirs.data_dir().join("board"))
        .unwrap_or_else(|| PathBuf::from(".taskboard"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert!(cfg.store.is_none());
        assert_eq!(cfg.view.sort_key, "promise_date");
        assert_eq!(cfg.view.sort_order, "asc");
        assert_eq!(cfg.view.date_range, "month");
        assert_eq!(cfg.view.layout, "list");
        assert_eq!(cfg.tasks.default_priority, "Medium");
        assert_eq!(cfg.tasks.default_status, "Pending");
        assert_eq!(cfg.tasks.promise_days, 2);
        assert_eq!(cfg.feed.poll_interval_ms, 500);
        assert_eq!(cfg.feed.lock_timeout_ms, 5000);
        assert_eq!(cfg.sort_state().unwrap(), SortState::default());
        assert_eq!(cfg.date_range().unwrap(), DateRange::CurrentMonth);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
store = "./board"

[view]
sort_key = "priority"
sort_order = "desc"
date_range = "all"
layout = "calendar"

[tasks]
default_priority = "urgent"
default_status = "In Progress"
promise_days = 7

[feed]
poll_interval_ms = 50
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.store_dir(), PathBuf::from("./board"));
        assert_eq!(cfg.sort_state().unwrap().key, SortKey::Priority);
        assert_eq!(cfg.sort_state().unwrap().order, SortOrder::Desc);
        assert_eq!(cfg.date_range().unwrap(), DateRange::All);
        assert_eq!(cfg.layout().unwrap(), Layout::Calendar);
        assert_eq!(cfg.default_priority().unwrap(), Priority::Urgent);
        assert_eq!(cfg.default_status().unwrap(), Status::InProgress);
        assert_eq!(cfg.tasks.promise_days, 7);
        assert_eq!(cfg.feed.poll_interval_ms, 50);
        assert_eq!(cfg.feed.lock_timeout_ms, 5000);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.view.sort_key = "colour".to_string();
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.view.date_range = "week".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tasks.promise_days = 400;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.feed.poll_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tasks.default_status = "Blocked".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let mut cfg = Config::default();
        cfg.store = Some(PathBuf::from("/tmp/board"));
        cfg.view.layout = "charts".to_string();
        cfg.save(&path).expect("save");

        let loaded = Config::load(&path).expect("load");
        assert_eq!(loaded.store, cfg.store);
        assert_eq!(loaded.view.layout, "charts");
    }
}
