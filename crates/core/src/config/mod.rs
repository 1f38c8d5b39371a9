use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ArDancerError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub character: CharacterConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values the runtime cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(ArDancerError::InvalidInput("sample rate must be non-zero"));
        }
        if self.audio.channels == 0 {
            return Err(ArDancerError::InvalidInput("channel count must be non-zero"));
        }
        if self.audio.block_size == 0 {
            return Err(ArDancerError::InvalidInput("block size must be non-zero"));
        }
        if self.character.tick_interval_ms == 0 {
            return Err(ArDancerError::InvalidInput("tick interval must be non-zero"));
        }
        if !self.character.loudness_threshold.is_finite() || self.character.loudness_threshold < 0.0
        {
            return Err(ArDancerError::InvalidInput(
                "loudness threshold must be a non-negative number",
            ));
        }
        if self.assets.stopped.is_empty() || self.assets.dancing.is_empty() {
            return Err(ArDancerError::InvalidInput("asset names must not be empty"));
        }
        Ok(())
    }
}

/// Configuration specific to the microphone capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            block_size: 1024,
        }
    }
}

/// Tuning knobs of the character behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Loudness strictly above this value interrupts the dance.
    pub loudness_threshold: f32,
    /// The dance resumes once the stopped counter exceeds this value.
    pub stopped_tick_threshold: u32,
    pub tick_interval_ms: u64,
    pub turn_duration_ms: u64,
    /// Height added above the hit-test point so the character drops onto the plane.
    pub spawn_height_offset: f32,
    pub scale: f32,
}

impl CharacterConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.turn_duration_ms)
    }
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            loudness_threshold: 0.01,
            stopped_tick_threshold: 5,
            tick_interval_ms: 1000,
            turn_duration_ms: 1000,
            spawn_height_offset: 0.3,
            scale: 0.0005,
        }
    }
}

/// Names of the visuals attached for each character state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub stopped: String,
    pub dancing: String,
    pub walking: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            stopped: "art.scnassets/Talking.dae".to_string(),
            dancing: "art.scnassets/Dancing.dae".to_string(),
            walking: "art.scnassets/walk.dae".to_string(),
        }
    }
}
