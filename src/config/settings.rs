//! Tool settings: where the limits live and how to talk to the farm
//!
//! Loaded from `<config_dir>/farm-limits/settings.json` when present,
//! otherwise defaults matching the studio layout. Env vars override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::constants::config::*;
use crate::constants::reconcile::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_DELAY_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Authoritative limits file
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Folder holding the staged edit
    #[serde(default = "default_temp_folder")]
    pub temp_folder: PathBuf,

    /// Folder receiving one backup per commit
    #[serde(default = "default_backup_folder")]
    pub backup_folder: PathBuf,

    /// Engine endpoint serving the currently active limits
    #[serde(default = "default_live_url")]
    pub live_limits_url: String,

    /// Program followed by its arguments
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,

    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Substrings of show names left out of the show selection
    #[serde(default = "default_hidden_shows")]
    pub hidden_shows: Vec<String>,
}

fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn default_temp_folder() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_FOLDER)
}

fn default_backup_folder() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_FOLDER)
}

fn default_live_url() -> String {
    DEFAULT_LIVE_URL.to_string()
}

fn default_reload_command() -> Vec<String> {
    vec![
        DEFAULT_RELOAD_PROGRAM.to_string(),
        DEFAULT_RELOAD_SCRIPT.to_string(),
    ]
}

fn default_poll_delay_secs() -> u64 {
    DEFAULT_POLL_DELAY_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_hidden_shows() -> Vec<String> {
    DEFAULT_HIDDEN_SHOWS.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            temp_folder: default_temp_folder(),
            backup_folder: default_backup_folder(),
            live_limits_url: default_live_url(),
            reload_command: default_reload_command(),
            poll_delay_secs: default_poll_delay_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            hidden_shows: default_hidden_shows(),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load `path` (defaults when absent), then apply env overrides
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            let settings: Settings = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings JSON from {:?}", path))?;
            info!(path = %path.display(), "Loaded settings");
            settings
        } else {
            info!(path = %path.display(), "No settings file, using defaults");
            Settings::default()
        };
        settings.apply_overrides(|var| env::var(var).ok());
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_CONFIG_PATH) {
            self.config_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_TEMP_FOLDER) {
            self.temp_folder = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_BACKUP_FOLDER) {
            self.backup_folder = PathBuf::from(path);
        }
        if let Some(url) = lookup(ENV_LIVE_URL) {
            self.live_limits_url = url;
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
