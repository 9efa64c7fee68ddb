//! RoPE configuration types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Base of the geometric frequency progression when none is given.
pub const DEFAULT_ROPE_BASE: f32 = 10000.0;

fn default_rope_base() -> f32 {
    DEFAULT_ROPE_BASE
}

fn default_rope_scale() -> f32 {
    1.0
}

/// RoPE configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RopeConfig {
    /// Number of leading features of the last axis that get rotated
    pub dimensions: usize,

    /// Pair adjacent features `(2k, 2k+1)` instead of `(k, k + dims/2)`
    #[serde(default)]
    pub traditional: bool,

    #[serde(default = "default_rope_base", alias = "rope_theta")]
    pub base: f32,

    /// Position multiplier (position interpolation)
    #[serde(default = "default_rope_scale")]
    pub scale: f32,

    #[serde(default, alias = "rope_scaling")]
    pub scaling: Option<RopeScalingConfig>,
}

impl RopeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 || self.dimensions % 2 != 0 {
            return Err(Error::Config {
                reason: format!(
                    "rope dimensions must be even and > 0, got {}",
                    self.dimensions
                ),
            });
        }
        if !(self.base.is_finite() && self.base > 0.0) {
            return Err(Error::Config {
                reason: format!("rope base must be positive, got {}", self.base),
            });
        }
        if !self.scale.is_finite() {
            return Err(Error::Config {
                reason: format!("rope scale must be finite, got {}", self.scale),
            });
        }
        if let Some(scaling) = &self.scaling {
            scaling.validate()?;
        }
        Ok(())
    }
}

/// Context-extension frequency scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RopeScalingType {
    /// Every frequency divided by `factor`
    Linear,
    /// Wavelength-dependent scaling with a smooth band between low/high cutoffs
    Llama3,
}

/// RoPE scaling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RopeScalingConfig {
    #[serde(rename = "type", alias = "rope_type")]
    pub scaling_type: RopeScalingType,
    pub factor: f32,
    #[serde(default)]
    pub original_max_position_embeddings: Option<usize>,
    #[serde(default)]
    pub low_freq_factor: Option<f32>,
    #[serde(default)]
    pub high_freq_factor: Option<f32>,
}

impl RopeScalingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.factor.is_finite() && self.factor > 0.0) {
            return Err(Error::Config {
                reason: format!("rope scaling factor must be positive, got {}", self.factor),
            });
        }
        if self.scaling_type == RopeScalingType::Llama3 {
            let low = self.low_freq_factor.unwrap_or(1.0);
            let high = self.high_freq_factor.unwrap_or(4.0);
            if high <= low {
                return Err(Error::Config {
                    reason: format!(
                        "high_freq_factor ({high}) must exceed low_freq_factor ({low})"
                    ),
                });
            }
        }
        Ok(())
    }
}
