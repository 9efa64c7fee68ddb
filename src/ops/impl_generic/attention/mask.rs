//! Attention mask normalization.
//!
//! Every mask form is reduced to an additive tensor of rank 4 that
//! broadcasts to the score shape `[B, H_q, S_q, S_kv]`.

use super::shape::SdpaDims;
use crate::error::{Error, Result};
use crate::ops::impl_generic::precision::cast_if_needed;
use crate::ops::traits::AttentionMask;
use numr::dtype::DType;
use numr::ops::TypeConversionOps;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Check that `mask_shape` right-aligns onto the score shape and return it
/// left-padded with ones to rank 4.
pub fn broadcast_mask_shape(mask_shape: &[usize], dims: &SdpaDims) -> Result<[usize; 4]> {
    let target = dims.score_shape();
    if mask_shape.len() > 4 {
        return Err(Error::ShapeMismatch {
            arg: "mask",
            reason: format!("rank {} exceeds score rank 4", mask_shape.len()),
        });
    }
    let mut padded = [1usize; 4];
    padded[4 - mask_shape.len()..].copy_from_slice(mask_shape);
    for (axis, (&m, &t)) in padded.iter().zip(target.iter()).enumerate() {
        if m != 1 && m != t {
            return Err(Error::ShapeMismatch {
                arg: "mask",
                reason: format!(
                    "{:?} does not broadcast to scores {:?} (axis {})",
                    mask_shape, target, axis
                ),
            });
        }
    }
    Ok(padded)
}

/// Whether query row `i` may see key `j` under a causal mask aligned to the
/// last key.
#[inline]
pub fn causal_visible(i: usize, j: usize, seq_q: usize, seq_kv: usize) -> bool {
    j + seq_q <= i + seq_kv
}

/// Additive `[S_q, S_kv]` causal mask.
pub fn causal_mask_data(seq_q: usize, seq_kv: usize) -> Vec<f32> {
    let mut data = vec![0.0f32; seq_q * seq_kv];
    for i in 0..seq_q {
        for j in 0..seq_kv {
            if !causal_visible(i, j, seq_q, seq_kv) {
                data[i * seq_kv + j] = f32::NEG_INFINITY;
            }
        }
    }
    data
}

/// Map boolean-style values to additive bias: non-zero -> 0, zero -> -inf.
pub fn bool_to_additive(values: &[f32]) -> Vec<f32> {
    values
        .iter()
        .map(|&v| if v != 0.0 { 0.0 } else { f32::NEG_INFINITY })
        .collect()
}

/// Lower any mask form to an additive tensor of rank 4 in `dtype`.
///
/// Additive masks are cast, not rounded through f32, so an f64 bias keeps its
/// precision on the f64 path.
pub fn mask_to_additive<R, C>(
    client: &C,
    mask: &AttentionMask<R>,
    dims: &SdpaDims,
    dtype: DType,
    device: &R::Device,
) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: TypeConversionOps<R>,
{
    match mask {
        AttentionMask::Additive(t) => {
            let padded = broadcast_mask_shape(t.shape(), dims)?;
            let t = cast_if_needed(client, &t.contiguous(), dtype)?;
            Ok(t.reshape(&padded)?)
        }
        AttentionMask::Boolean(t) => {
            let padded = broadcast_mask_shape(t.shape(), dims)?;
            let values = cast_if_needed(client, &t.contiguous(), DType::F32)?.to_vec::<f32>();
            let data = bool_to_additive(&values);
            Ok(bias_tensor::<R>(&data, &padded, dtype, device))
        }
        AttentionMask::Causal => {
            let data = causal_mask_data(dims.seq_q, dims.seq_kv);
            Ok(bias_tensor::<R>(
                &data,
                &[1, 1, dims.seq_q, dims.seq_kv],
                dtype,
                device,
            ))
        }
    }
}

// 0 and -inf are exact in both float widths.
fn bias_tensor<R>(data: &[f32], shape: &[usize], dtype: DType, device: &R::Device) -> Tensor<R>
where
    R: Runtime<DType = DType>,
{
    if dtype == DType::F64 {
        let wide: Vec<f64> = data.iter().map(|&v| v as f64).collect();
        Tensor::<R>::from_slice(&wide, shape, device)
    } else {
        Tensor::<R>::from_slice(data, shape, device)
    }
}
