//! Inventory configuration
//!
//! ```toml
//! [layout]
//! bag_slots = 4
//! main_pack_slots = 16
//! bank_slots = 28
//! bank_bag_slots = 7
//! buyback_slots = 12
//! ```

use crate::container::SlotLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub layout: SlotLayout,
}

impl InventoryConfig {
    /// Parse and validate configuration from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: InventoryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check slot ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if layout.main_pack_slots == 0 {
            return Err(ConfigError::Validation("main_pack_slots must be non-zero".into()));
        }
        if layout.bag_slots == 0 {
            return Err(ConfigError::Validation("bag_slots must be non-zero".into()));
        }
        if layout.total_slots() > u16::MAX as u32 {
            return Err(ConfigError::Validation(format!(
                "{} flat slots do not fit a 16-bit slot index",
                layout.total_slots()
            )));
        }
        Ok(())
    }
}
