use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NarrationError, Result};

/// Narration settings shared by the coordinator and the host binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Keep narrating newly appended content after the available chunks run out
    #[serde(default)]
    pub autoplay: bool,

    /// Scroll the highlighted chunk into view after each highlight
    #[serde(default = "default_auto_scroll")]
    pub auto_scroll: bool,

    /// How long an utterance may stay accepted-but-silent before it is cancelled
    #[serde(default = "default_speech_start_timeout_ms")]
    pub speech_start_timeout_ms: u64,

    /// Grace period for a superseded loop to exit before a new session starts
    #[serde(default = "default_restart_settle_ms")]
    pub restart_settle_ms: u64,

    /// Delay before retrying a chunk after a system interruption
    #[serde(default = "default_retry_settle_ms")]
    pub retry_settle_ms: u64,

    /// Layout settle delay before the first highlight of a run (two frames)
    #[serde(default = "default_render_settle_ms")]
    pub render_settle_ms: u64,

    /// Fraction of the visible height left above the highlighted chunk
    #[serde(default = "default_scroll_buffer_ratio")]
    pub scroll_buffer_ratio: f64,

    /// Scrolling is skipped when already this close to the target
    #[serde(default = "default_scroll_tolerance_px")]
    pub scroll_tolerance_px: f64,

    /// Target chunk size in characters (used by chunkers)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Speaking rate for engines that have to pace themselves
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// TTS command to run (None = auto-detect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_command: Option<String>,
}

fn default_auto_scroll() -> bool {
    true
}

fn default_speech_start_timeout_ms() -> u64 {
    2000
}

fn default_restart_settle_ms() -> u64 {
    100
}

fn default_retry_settle_ms() -> u64 {
    250
}

fn default_render_settle_ms() -> u64 {
    32
}

fn default_scroll_buffer_ratio() -> f64 {
    0.3
}

fn default_scroll_tolerance_px() -> f64 {
    8.0
}

fn default_chunk_size() -> usize {
    280
}

fn default_words_per_minute() -> u32 {
    180
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            autoplay: false,
            auto_scroll: default_auto_scroll(),
            speech_start_timeout_ms: default_speech_start_timeout_ms(),
            restart_settle_ms: default_restart_settle_ms(),
            retry_settle_ms: default_retry_settle_ms(),
            render_settle_ms: default_render_settle_ms(),
            scroll_buffer_ratio: default_scroll_buffer_ratio(),
            scroll_tolerance_px: default_scroll_tolerance_px(),
            chunk_size: default_chunk_size(),
            words_per_minute: default_words_per_minute(),
            voice_command: None,
        }
    }
}

impl NarrationConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: NarrationConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the configuration file path: ~/.config/cli-programs/narrate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| NarrationError::Config("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/cli-programs/narrate.toml"))
    }

    pub fn speech_start_timeout(&self) -> Duration {
        Duration::from_millis(self.speech_start_timeout_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn retry_settle(&self) -> Duration {
        Duration::from_millis(self.retry_settle_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    /// Settings with every delay shortened, for driving the coordinator in tests
    pub fn fast() -> Self {
        Self {
            speech_start_timeout_ms: 50,
            restart_settle_ms: 5,
            retry_settle_ms: 1,
            render_settle_ms: 0,
            ..Self::default()
        }
    }
}
