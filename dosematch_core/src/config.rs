//! Configuration file support for DoseMatch.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosematch/config.toml`.

use crate::pack::PackOptions;
use crate::sig::{SigParser, MIN_CONFIDENCE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sig: SigConfig,

    #[serde(default)]
    pub packs: PackOptions,
}

/// Rule parser configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SigConfig {
    /// Parses scoring below this are abstained
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for SigConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> f64 {
    MIN_CONFIDENCE
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        base.join("dosematch").join("config.toml")
    }

    /// Reject values the parser or engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.sig.min_confidence;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "sig.min_confidence must be between 0 and 1, got {}",
                threshold
            )));
        }

        let cap = self.packs.overfill_cap;
        if !cap.is_finite() || cap < 0.0 {
            return Err(Error::Config(format!(
                "packs.overfill_cap must be non-negative, got {}",
                cap
            )));
        }

        if self.packs.max_packs_per_group < 2 {
            return Err(Error::Config(format!(
                "packs.max_packs_per_group must be at least 2, got {}",
                self.packs.max_packs_per_group
            )));
        }

        Ok(())
    }

    /// Rule parser using the configured threshold
    pub fn sig_parser(&self) -> SigParser {
        SigParser::new(self.sig.min_confidence)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml_string()?)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
