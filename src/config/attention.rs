//! Attention configuration types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Attention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    pub num_heads: usize,

    #[serde(default, alias = "num_key_value_heads")]
    pub num_kv_heads: Option<usize>,

    pub head_dim: usize,

    /// Score scale; `1/sqrt(head_dim)` when absent
    #[serde(default)]
    pub scale: Option<f32>,

    /// Key length above which the blocked (memory-efficient) kernel is used
    #[serde(default)]
    pub memory_efficient_threshold: Option<usize>,
}

impl AttentionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_heads == 0 {
            return Err(Error::Config {
                reason: "num_heads must be > 0".into(),
            });
        }
        if self.head_dim == 0 {
            return Err(Error::Config {
                reason: "head_dim must be > 0".into(),
            });
        }
        if let Some(kv) = self.num_kv_heads {
            if kv == 0 || self.num_heads % kv != 0 {
                return Err(Error::Config {
                    reason: format!(
                        "num_heads ({}) must be divisible by num_kv_heads ({kv})",
                        self.num_heads
                    ),
                });
            }
        }
        if let Some(scale) = self.scale {
            if !scale.is_finite() {
                return Err(Error::Config {
                    reason: format!("scale must be finite, got {scale}"),
                });
            }
        }
        Ok(())
    }

    pub fn kv_heads(&self) -> usize {
        self.num_kv_heads.unwrap_or(self.num_heads)
    }

    /// Resolved score scale.
    pub fn scale(&self) -> f32 {
        self.scale
            .unwrap_or_else(|| (self.head_dim as f32).sqrt().recip())
    }

    /// Check if this is GQA (Grouped Query Attention)
    pub fn is_gqa(&self) -> bool {
        self.kv_heads() != self.num_heads
    }
}
