//! Layer Normalization module
//!
//! LayerNorm: output = (x - mean) / sqrt(var + eps) * weight + bias
//! Weight and bias are independently optional.

use crate::config::NormConfig;
use crate::error::Result;
use crate::ops::FastNormOps;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Layer Normalization
///
/// weight (gamma): `[hidden_size]`
/// bias (beta): `[hidden_size]`
pub struct LayerNorm<R: Runtime> {
    weight: Option<Tensor<R>>,
    bias: Option<Tensor<R>>,
    eps: f32,
}

impl<R: Runtime> LayerNorm<R> {
    pub fn new(weight: Option<Tensor<R>>, bias: Option<Tensor<R>>, eps: f32) -> Self {
        Self { weight, bias, eps }
    }

    /// Without learned affine parameters.
    pub fn plain(eps: f32) -> Self {
        Self::new(None, None, eps)
    }

    pub fn from_config(
        weight: Option<Tensor<R>>,
        bias: Option<Tensor<R>>,
        config: &NormConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(weight, bias, config.eps))
    }

    /// input: `[..., hidden_size]`, output: same shape
    pub fn forward<C>(&self, client: &C, input: &Tensor<R>) -> Result<Tensor<R>>
    where
        C: FastNormOps<R>,
    {
        client.fast_layer_norm(input, self.weight.as_ref(), self.bias.as_ref(), self.eps)
    }

    pub fn weight(&self) -> Option<&Tensor<R>> {
        self.weight.as_ref()
    }

    pub fn bias(&self) -> Option<&Tensor<R>> {
        self.bias.as_ref()
    }
}
