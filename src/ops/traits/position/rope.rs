//! Rotary Position Embedding (RoPE) operations trait

use crate::config::RopeConfig;
use crate::error::Result;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Scalar parameters of a RoPE application.
///
/// `base` stays optional so the op can apply its own default
/// ([`DEFAULT_ROPE_BASE`](crate::config::DEFAULT_ROPE_BASE)) when the caller has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoPEParams {
    /// Leading features of the last axis that get rotated; the rest pass through
    pub dimensions: usize,
    /// `true`: pairs `(2k, 2k+1)`; `false`: pairs `(k, k + dimensions/2)`
    pub traditional: bool,
    /// Frequency base; `None` falls back to `DEFAULT_ROPE_BASE`
    pub base: Option<f32>,
    /// Multiplies the position index before the angle is taken
    pub scale: f32,
    /// Position of the first row along the sequence axis
    pub offset: usize,
}

impl RoPEParams {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            traditional: false,
            base: None,
            scale: 1.0,
            offset: 0,
        }
    }

    pub fn from_config(config: &RopeConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            traditional: config.traditional,
            base: Some(config.base),
            scale: config.scale,
            offset: 0,
        }
    }

    pub fn with_traditional(mut self, traditional: bool) -> Self {
        self.traditional = traditional;
        self
    }

    pub fn with_base(mut self, base: f32) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Rotary Position Embedding operation
///
/// Rotates feature pairs of `x` by `position * f_k`, where the position of
/// sequence row `s` is `(offset + s) * scale` and `f_k = base^(-2k/dimensions)`
/// unless explicit `freqs` are supplied.
///
/// # Layout contract
///
/// - `x`: `[..., S, D]`, axis -2 is the position axis, axis -1 the features
/// - `freqs`: optional `[dimensions/2]` of per-pair angular frequencies, overrides `base`
/// - Output: same shape and dtype as `x`
///
/// # Errors
///
/// - `InvalidArgument`: odd or zero `dimensions`, non-finite `scale`, rank < 2
/// - `ShapeMismatch`: `dimensions > D`, `freqs` not `[dimensions/2]`
pub trait FastRoPEOps<R: Runtime> {
    fn fast_rope(
        &self,
        x: &Tensor<R>,
        params: &RoPEParams,
        freqs: Option<&Tensor<R>>,
    ) -> Result<Tensor<R>>;
}
