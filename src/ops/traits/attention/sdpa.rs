//! Scaled dot-product attention operations trait

use crate::error::{Error, Result};
use numr::dtype::DType;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Attention mask, applied to the scores before softmax.
///
/// Tensor masks have rank <= 4 and must broadcast (right-aligned) to the
/// score shape `[B, H_q, S_q, S_kv]`.
pub enum AttentionMask<R: Runtime> {
    /// Added to the scores as-is (`-inf` removes a position)
    Additive(Tensor<R>),
    /// Non-zero entries attend, zero entries are treated as `-inf`
    Boolean(Tensor<R>),
    /// Query `i` sees keys `j <= i + (S_kv - S_q)`, i.e. the causal triangle
    /// aligned to the most recent keys
    Causal,
}

impl<R: Runtime> Clone for AttentionMask<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Additive(t) => Self::Additive(t.clone()),
            Self::Boolean(t) => Self::Boolean(t.clone()),
            Self::Causal => Self::Causal,
        }
    }
}

impl<R: Runtime<DType = DType>> AttentionMask<R> {
    /// Build an additive mask from host booleans (`true` = attend).
    pub fn from_bools(mask: &[bool], shape: &[usize], device: &R::Device) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != mask.len() {
            return Err(Error::ShapeMismatch {
                arg: "mask",
                reason: format!("{} values for shape {:?}", mask.len(), shape),
            });
        }
        let data: Vec<f32> = mask
            .iter()
            .map(|&keep| if keep { 0.0 } else { f32::NEG_INFINITY })
            .collect();
        Ok(Self::Additive(Tensor::<R>::from_slice(&data, shape, device)))
    }

    /// Shape of the mask tensor, `None` for [`AttentionMask::Causal`].
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Self::Additive(t) | Self::Boolean(t) => Some(t.shape()),
            Self::Causal => None,
        }
    }
}

/// Scaled dot-product attention with grouped/multi-query head sharing.
///
/// `softmax((Q * scale) @ K^T + mask) @ V`, softmax evaluated in at least f32.
///
/// # Layout contract
///
/// - `q`: `[B, H_q, S_q, D]`: queries
/// - `k`: `[B, H_kv, S_kv, D]`: keys, `H_q % H_kv == 0`, never pre-expanded
/// - `v`: `[B, H_kv, S_kv, D_v]`: values
/// - `mask`: optional, see [`AttentionMask`]
/// - `memory_efficient_threshold`: when `S_kv` exceeds it, keys are streamed in
///   blocks of at most this many rows instead of materializing all scores
/// - Output: `[B, S_q, H_q, D_v]`
///
/// Single-token queries (`S_q == 1`) take a fused decode path where the backend
/// has one; every path agrees up to floating-point rounding.
pub trait FastAttentionOps<R: Runtime> {
    fn fast_scaled_dot_product_attention(
        &self,
        q: &Tensor<R>,
        k: &Tensor<R>,
        v: &Tensor<R>,
        scale: f32,
        mask: Option<&AttentionMask<R>>,
        memory_efficient_threshold: Option<usize>,
    ) -> Result<Tensor<R>>;
}
