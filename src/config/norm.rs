//! Normalization configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub(crate) fn default_norm_eps() -> f32 {
    1e-5
}

/// Shared by RMSNorm and LayerNorm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormConfig {
    #[serde(default = "default_norm_eps", alias = "rms_norm_eps", alias = "layer_norm_eps")]
    pub eps: f32,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            eps: default_norm_eps(),
        }
    }
}

impl NormConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::Config {
                reason: format!("eps must be a positive finite value, got {}", self.eps),
            });
        }
        Ok(())
    }
}
