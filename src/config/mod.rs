//! Serde-deserializable configuration for the fast ops and nn layers.
//!
//! Mirrors the fields a model's `config.json` carries for attention, RoPE and
//! normalization, with the same defaults the ops apply when a value is absent.

pub mod attention;
pub mod norm;
pub mod rope;

pub use attention::AttentionConfig;
pub use norm::NormConfig;
pub use rope::{DEFAULT_ROPE_BASE, RopeConfig, RopeScalingConfig, RopeScalingType};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bundle of the per-op configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastConfig {
    pub attention: AttentionConfig,

    pub rope: RopeConfig,

    #[serde(default)]
    pub norm: NormConfig,
}

impl FastConfig {
    /// Parse and validate from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| Error::Config {
            reason: format!("failed to parse config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.attention.validate()?;
        self.rope.validate()?;
        self.norm.validate()?;
        if self.rope.dimensions > self.attention.head_dim {
            return Err(Error::Config {
                reason: format!(
                    "rope dimensions ({}) exceed head_dim ({})",
                    self.rope.dimensions, self.attention.head_dim
                ),
            });
        }
        Ok(())
    }
}
