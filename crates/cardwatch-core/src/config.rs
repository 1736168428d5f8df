//! Configuration types for the cardwatch system
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is built once at startup and handed to the engine and the
//! collaborators; nothing in the core reads the process environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default messaging API base URL
pub const DEFAULT_NOTIFY_API_URL: &str = "https://api-krolik.telezapy.tech";

/// Default board API base URL
pub const DEFAULT_BOARD_API_URL: &str = "https://api.trello.com";

/// Main cardwatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Board API configuration
    pub board: BoardConfig,

    /// Messaging API configuration
    pub notifier: NotifierConfig,

    /// Snapshot store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Poll loop settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WatchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.board.validate()?;
        self.notifier.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Board API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board API key
    pub api_key: String,

    /// Board API token
    pub api_token: String,

    /// Board identifier
    pub board_id: String,

    /// API base URL
    #[serde(default = "default_board_api_url")]
    pub api_url: String,
}

impl BoardConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_token: impl Into<String>,
        board_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_token: api_token.into(),
            board_id: board_id.into(),
            api_url: default_board_api_url(),
        }
    }

    /// Validate the board configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::config("Board API key cannot be empty"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Board API token cannot be empty"));
        }
        if self.board_id.is_empty() {
            return Err(crate::Error::config("Board id cannot be empty"));
        }
        validate_url("Board API URL", &self.api_url)
    }
}

// Credentials never reach log output
impl fmt::Debug for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfig")
            .field("api_key", &"<REDACTED>")
            .field("api_token", &"<REDACTED>")
            .field("board_id", &self.board_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Messaging API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// API base URL
    #[serde(default = "default_notify_api_url")]
    pub api_url: String,

    /// Bearer key
    pub api_key: String,

    /// Destination phone number
    pub phone_number: String,

    /// `connectionFrom` field sent with every message
    #[serde(default = "default_connection_from")]
    pub connection_from: u32,

    /// `ticketStrategy` field sent with every message
    #[serde(default = "default_ticket_strategy")]
    pub ticket_strategy: String,

    /// Log messages instead of posting them
    #[serde(default)]
    pub dry_run: bool,
}

impl NotifierConfig {
    pub fn new(api_key: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            api_url: default_notify_api_url(),
            api_key: api_key.into(),
            phone_number: phone_number.into(),
            connection_from: default_connection_from(),
            ticket_strategy: default_ticket_strategy(),
            dry_run: false,
        }
    }

    /// Validate the messaging configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::config("Messaging API key cannot be empty"));
        }
        if self.phone_number.is_empty() {
            return Err(crate::Error::config("Destination phone number cannot be empty"));
        }
        if self.ticket_strategy.is_empty() {
            return Err(crate::Error::config("Ticket strategy cannot be empty"));
        }
        validate_url("Messaging API URL", &self.api_url)
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<REDACTED>")
            .field("phone_number", &self.phone_number)
            .field("connection_from", &self.connection_from)
            .field("ticket_strategy", &self.ticket_strategy)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn validate_url(label: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", label)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            label, url
        )));
    }
    Ok(())
}

/// Snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based snapshot store
    File {
        /// Path to the snapshot JSON file
        path: String,
        /// Path to the initialization marker (defaults next to `path`)
        #[serde(default)]
        marker_path: Option<String>,
    },

    /// In-memory snapshot store (not persistent)
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path, marker_path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Snapshot path cannot be empty"));
                }
                if marker_path.as_deref() == Some("") {
                    return Err(crate::Error::config("Marker path cannot be empty"));
                }
                Ok(())
            }
            StateStoreConfig::Memory => Ok(()),
        }
    }

    /// Resolved marker path for the file store
    ///
    /// Without an explicit marker path, the marker is `.initialized` in the
    /// snapshot file's directory.
    pub fn resolved_marker_path(&self) -> Option<PathBuf> {
        match self {
            StateStoreConfig::File {
                marker_path: Some(marker),
                ..
            } => Some(PathBuf::from(marker)),
            StateStoreConfig::File { path, .. } => {
                let parent = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
                Some(parent.join(".initialized"))
            }
            StateStoreConfig::Memory => None,
        }
    }

    /// Store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
        }
    }
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig::File {
            path: "trello-state.json".to_string(),
            marker_path: None,
        }
    }
}

/// What the engine does when the persisted snapshot cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptSnapshotPolicy {
    /// Diff against an empty snapshot (every card is reported as created)
    #[default]
    TreatAsEmpty,
    /// Persist the fresh state without notifying, like a first run
    Rebaseline,
}

impl std::str::FromStr for CorruptSnapshotPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "treat_as_empty" | "empty" => Ok(Self::TreatAsEmpty),
            "rebaseline" => Ok(Self::Rebaseline),
            other => Err(crate::Error::config(format!(
                "Unknown corrupt snapshot policy '{}'. Valid: treat_as_empty, rebaseline",
                other
            ))),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wait after each completed cycle (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Wait after a failed fetch (in seconds); defaults to the poll interval
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,

    /// Pause after each notification (in seconds)
    ///
    /// Throttles delivery so the messaging API is not flooded when many
    /// cards change at once.
    #[serde(default = "default_notify_delay_secs")]
    pub notify_delay_secs: u64,

    /// Handling of an unreadable snapshot
    #[serde(default)]
    pub on_corrupt_snapshot: CorruptSnapshotPolicy,

    /// Capacity of the engine event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.retry_delay_secs == Some(0) {
            return Err(crate::Error::config("Retry delay must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs.unwrap_or(self.poll_interval_secs))
    }

    pub fn notify_delay(&self) -> Duration {
        Duration::from_secs(self.notify_delay_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            retry_delay_secs: None,
            notify_delay_secs: default_notify_delay_secs(),
            on_corrupt_snapshot: CorruptSnapshotPolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_board_api_url() -> String {
    DEFAULT_BOARD_API_URL.to_string()
}

fn default_notify_api_url() -> String {
    DEFAULT_NOTIFY_API_URL.to_string()
}

fn default_connection_from() -> u32 {
    5
}

fn default_ticket_strategy() -> String {
    "create".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_notify_delay_secs() -> u64 {
    2
}

fn default_event_channel_capacity() -> usize {
    100
}
