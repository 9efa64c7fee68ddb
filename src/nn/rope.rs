//! RoPE (Rotary Position Embedding) module
//!
//! Wraps FastRoPEOps with a fixed configuration. When the configuration
//! carries a scaling rule the scaled frequency table is computed once and
//! handed to every call.

use crate::config::RopeConfig;
use crate::error::Result;
use crate::ops::impl_generic::rope_frequencies;
use crate::ops::{FastRoPEOps, RoPEParams};
use numr::dtype::DType;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Rotary Position Embedding module
pub struct RoPE<R: Runtime> {
    params: RoPEParams,
    /// `[dimensions/2]` f64, only present for scaled configurations
    freqs: Option<Tensor<R>>,
}

impl<R: Runtime<DType = DType>> RoPE<R> {
    pub fn new(params: RoPEParams) -> Self {
        Self {
            params,
            freqs: None,
        }
    }

    /// Use an explicit frequency table `[dimensions/2]` instead of `base`.
    pub fn with_frequencies(params: RoPEParams, freqs: Tensor<R>) -> Self {
        Self {
            params,
            freqs: Some(freqs),
        }
    }

    /// Supports:
    /// - No scaling (standard RoPE, frequencies derived from `base` per call)
    /// - Linear scaling: `freq /= factor`
    /// - Llama3: frequency-dependent scaling with low/high freq factors
    pub fn from_config(config: &RopeConfig, device: &R::Device) -> Result<Self> {
        config.validate()?;
        let params = RoPEParams::from_config(config);
        let Some(scaling) = config.scaling.as_ref() else {
            return Ok(Self::new(params));
        };

        let freqs = rope_frequencies(config.dimensions, config.base, Some(scaling));
        tracing::debug!(
            dims = config.dimensions,
            scaling = ?scaling.scaling_type,
            "rope: precomputed scaled frequencies"
        );
        let freqs = Tensor::<R>::from_slice(&freqs, &[freqs.len()], device);
        Ok(Self::with_frequencies(params, freqs))
    }

    /// Apply RoPE to `x: [..., S, D]`, with the first row at position `offset`.
    pub fn forward<C>(&self, client: &C, x: &Tensor<R>, offset: usize) -> Result<Tensor<R>>
    where
        C: FastRoPEOps<R>,
    {
        let params = self.params.with_offset(offset);
        client.fast_rope(x, &params, self.freqs.as_ref())
    }

    pub fn params(&self) -> &RoPEParams {
        &self.params
    }

    pub fn frequencies(&self) -> Option<&Tensor<R>> {
        self.freqs.as_ref()
    }
}
