//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/docsync/config.toml)
//! 3. Environment variables (DOCSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::ConflictChoice;

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCSYNC";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for engine state (state.db, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Whether sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Target container: the directory acting as the remote store
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,

    /// Log file (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Sync engine tuning
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Sync engine tuning, as stored in the `[sync]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period before queued changes are pushed
    pub debounce_ms: u64,
    /// Minimum local/remote divergence treated as a conflict
    pub conflict_threshold_ms: u64,
    /// Total attempts per sync before giving up
    pub max_attempts: u32,
    /// First retry delay
    pub retry_base_delay_ms: u64,
    /// Retry delay cap
    pub retry_max_delay_ms: u64,
    /// How long `Synced` is shown before reverting to `Idle`
    pub synced_grace_ms: u64,
    /// What to do when a conflict is detected
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 3000,
            conflict_threshold_ms: 5000,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            synced_grace_ms: 3000,
            conflict_policy: ConflictPolicy::Ask,
        }
    }
}

impl SyncConfig {
    /// Convert to engine settings
    pub fn settings(&self, sync_enabled: bool) -> SyncSettings {
        SyncSettings {
            enabled: sync_enabled,
            debounce: Duration::from_millis(self.debounce_ms),
            conflict_threshold: Duration::from_millis(self.conflict_threshold_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
            synced_grace: Duration::from_millis(self.synced_grace_ms),
            conflict_policy: self.conflict_policy,
        }
    }
}

/// How conflicts are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Wait for an explicit decision
    #[default]
    Ask,
    /// Keep the local copy
    Local,
    /// Keep the remote copy
    Remote,
    /// Keep both (fork the local copy)
    Both,
}

impl ConflictPolicy {
    /// The choice applied automatically, if any
    pub fn auto_choice(&self) -> Option<ConflictChoice> {
        match self {
            ConflictPolicy::Ask => None,
            ConflictPolicy::Local => Some(ConflictChoice::Local),
            ConflictPolicy::Remote => Some(ConflictChoice::Remote),
            ConflictPolicy::Both => Some(ConflictChoice::Both),
        }
    }
}

impl From<ConflictChoice> for ConflictPolicy {
    fn from(choice: ConflictChoice) -> Self {
        match choice {
            ConflictChoice::Local => ConflictPolicy::Local,
            ConflictChoice::Remote => ConflictPolicy::Remote,
            ConflictChoice::Both => ConflictPolicy::Both,
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(ConflictPolicy::Ask),
            "local" => Ok(ConflictPolicy::Local),
            "remote" => Ok(ConflictPolicy::Remote),
            "both" => Ok(ConflictPolicy::Both),
            _ => anyhow::bail!("Invalid conflict policy '{}'. Use ask, local, remote or both.", s),
        }
    }
}

/// Engine settings with typed durations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// User-level sync switch; `queue_sync` is a no-op when off
    pub enabled: bool,
    pub debounce: Duration,
    pub conflict_threshold: Duration,
    pub retry: RetryPolicy,
    pub synced_grace: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncConfig::default().settings(true)
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `retry` (0-indexed)
    ///
    /// `min(base * 2^retry, max)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts` failures
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_enabled: false,
            remote_dir: None,
            log_file: None,
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DOCSYNC_DATA_DIR, DOCSYNC_SYNC_ENABLED, DOCSYNC_REMOTE_DIR)
    /// 2. Config file (~/.config/docsync/config.toml or DOCSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // Empty string clears the target
        if let Ok(val) = std::env::var(format!("{}_REMOTE_DIR", ENV_PREFIX)) {
            self.remote_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DOCSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsync")
            .join("config.toml")
    }

    /// Get the path to the engine state database
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }

    /// Engine settings derived from this configuration
    pub fn sync_settings(&self) -> SyncSettings {
        self.sync.settings(self.sync_enabled)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsync")
}
