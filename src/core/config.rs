/// Player configuration — timings, volumes, and storage keys.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::storage::keys;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Tunables for a player. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Milliseconds between revealed characters.
    pub type_interval_ms: u64,
    /// Pause after a line finishes before autoplay advances.
    pub auto_delay_ms: u64,
    pub chapter_banner_ms: u64,
    /// Lets the ending sting ring out before the ending screen appears.
    pub ending_delay_ms: u64,
    pub toast_ms: u64,
    /// 0–100.
    pub bgm_volume: u8,
    /// 0–100.
    pub sfx_volume: u8,
    pub save_key: String,
    pub endings_key: String,
    /// Seeds noise buffers and click jitter.
    pub audio_seed: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            type_interval_ms: 25,
            auto_delay_ms: 2000,
            chapter_banner_ms: 3000,
            ending_delay_ms: 1500,
            toast_ms: 1500,
            bgm_volume: 40,
            sfx_volume: 60,
            save_key: keys::SAVE_SLOT.to_string(),
            endings_key: keys::ENDINGS.to_string(),
            audio_seed: 0,
        }
    }
}

impl PlayerConfig {
    pub fn load_from_ron(path: &Path) -> Result<PlayerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PlayerConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}
