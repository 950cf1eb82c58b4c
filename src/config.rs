//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a partial (or empty) file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::counting::CountingConfig;
use crate::learning::LearningConfig;
use crate::storage::DEFAULT_MEMORY_FILE;
use crate::types::BobError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub counting: CountingSection,
    pub betting: BettingConfig,
    pub learning: LearningSection,
    pub dashboard: DashboardConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { name: "BOB-001".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CountingSection {
    pub enabled: bool,
    pub shoe_size: u32,
    /// True count at which the bet ramp starts.
    pub true_count_threshold: f64,
}

impl Default for CountingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            shoe_size: 416,
            true_count_threshold: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BettingConfig {
    pub min_bet: f64,
    pub max_bet: f64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 10.0,
            max_bet: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningSection {
    pub enabled: bool,
    pub memory_file: PathBuf,
}

impl Default for LearningSection {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_file: PathBuf::from(DEFAULT_MEMORY_FILE),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    /// Write CSV exports on shutdown as well as on request.
    pub on_shutdown: bool,
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            on_shutdown: false,
            dir: PathBuf::from("exports"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the counter and betting ramp cannot work with.
    pub fn validate(&self) -> std::result::Result<(), BobError> {
        let b = &self.betting;
        if b.min_bet <= 0.0 || b.min_bet.is_nan() {
            return Err(BobError::Config(format!("min_bet must be positive, got {}", b.min_bet)));
        }
        if b.max_bet < b.min_bet {
            return Err(BobError::Config(format!(
                "max_bet ({}) must not be below min_bet ({})",
                b.max_bet, b.min_bet
            )));
        }
        if self.counting.shoe_size == 0 {
            return Err(BobError::Config("shoe_size must be at least one card".into()));
        }
        Ok(())
    }

    pub fn counting_config(&self) -> CountingConfig {
        CountingConfig {
            enabled: self.counting.enabled,
            shoe_size: self.counting.shoe_size,
            bet_threshold: self.counting.true_count_threshold,
            min_bet: self.betting.min_bet,
            max_bet: self.betting.max_bet,
        }
    }

    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            enabled: self.learning.enabled,
        }
    }
}
