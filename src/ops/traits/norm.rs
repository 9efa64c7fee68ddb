//! Normalization operations trait

use crate::error::Result;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Last-axis normalization.
///
/// Both ops reduce over axis -1 of `x` and return a tensor of the same shape
/// and dtype. `eps` is added inside the square root and must be positive.
pub trait FastNormOps<R: Runtime> {
    /// `x / sqrt(mean(x^2) + eps) * weight`
    ///
    /// - `weight`: `[D]` where `D` is the last-axis extent of `x`
    fn fast_rms_norm(&self, x: &Tensor<R>, weight: &Tensor<R>, eps: f32) -> Result<Tensor<R>>;

    /// `(x - mean) / sqrt(var + eps)`, then `* weight` and `+ bias` when given.
    ///
    /// An absent `weight` or `bias` skips that step entirely.
    fn fast_layer_norm(
        &self,
        x: &Tensor<R>,
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        eps: f32,
    ) -> Result<Tensor<R>>;
}
