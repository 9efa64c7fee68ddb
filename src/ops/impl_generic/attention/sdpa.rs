//! Generic scaled dot-product attention
//!
//! Same algorithm on every backend.
//! Composes numr primitives: mul_scalar, matmul, add, softmax, reshape, permute.
//!
//! Grouped-query heads are handled by folding the group into the query rows:
//! q `[B, H_q, S_q, D]` is viewed as `[B, H_kv, G*S_q, D]` (query head
//! `h = kv_h * G + g`), so keys and values are used at their own head count.

use super::mask::mask_to_additive;
use super::shape::{SdpaDims, validate_sdpa};
use crate::error::{Error, Result};
use crate::ops::impl_generic::precision::{cast_if_needed, compute_dtype};
use crate::ops::traits::AttentionMask;
use numr::dtype::DType;
use numr::ops::{ActivationOps, BinaryOps, MatmulOps, ReduceOps, ScalarOps, TypeConversionOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Same dtype across q, k, v.
pub fn validate_dtypes<R>(q: &Tensor<R>, k: &Tensor<R>, v: &Tensor<R>) -> Result<()>
where
    R: Runtime<DType = DType>,
{
    for (arg, t) in [("k", k), ("v", v)] {
        if t.dtype() != q.dtype() {
            return Err(Error::InvalidArgument {
                arg,
                reason: format!("dtype {:?} differs from q dtype {:?}", t.dtype(), q.dtype()),
            });
        }
    }
    Ok(())
}

/// `softmax((Q * scale) @ K^T + mask) @ V`, output `[B, S_q, H_q, D_v]`.
///
/// Scores are promoted to f32 (f64 stays f64) for mask addition and softmax,
/// then cast back to the storage dtype before multiplying with V. A query row
/// whose keys are all masked comes out as NaN.
pub fn scaled_dot_product_attention_impl<R, C>(
    client: &C,
    q: &Tensor<R>,
    k: &Tensor<R>,
    v: &Tensor<R>,
    scale: f32,
    mask: Option<&AttentionMask<R>>,
) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R>
        + MatmulOps<R>
        + ActivationOps<R>
        + BinaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TypeConversionOps<R>,
{
    let dims = validate_sdpa(q.shape(), k.shape(), v.shape(), scale)?;
    validate_dtypes(q, k, v)?;
    general_attention(client, q, k, v, scale, mask, &dims)
}

pub(crate) fn general_attention<R, C>(
    client: &C,
    q: &Tensor<R>,
    k: &Tensor<R>,
    v: &Tensor<R>,
    scale: f32,
    mask: Option<&AttentionMask<R>>,
    dims: &SdpaDims,
) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R>
        + MatmulOps<R>
        + ActivationOps<R>
        + BinaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TypeConversionOps<R>,
{
    let SdpaDims {
        batch: b,
        heads_q,
        heads_kv,
        seq_q,
        seq_kv,
        head_dim,
        head_dim_v,
    } = *dims;
    let rows = dims.group() * seq_q;
    let storage = q.dtype();
    let compute = compute_dtype(storage);

    // (Q * scale) regrouped to [B, H_kv, G*S_q, D]
    let q_scaled = client.mul_scalar(&q.contiguous(), scale as f64)?;
    let q_grouped = q_scaled.reshape(&[b, heads_kv, rows, head_dim])?;

    // [B, H_kv, G*S_q, S_kv]
    let k_t = k.transpose(-2, -1)?.contiguous();
    let scores = client.matmul(&q_grouped, &k_t)?;
    let scores = cast_if_needed(client, &scores, compute)?;

    let (scores, masked_rows) = match mask {
        Some(m) => {
            let additive = mask_to_additive(client, m, dims, compute, q.device())?
                .broadcast_to(&dims.score_shape())?
                .contiguous()
                .reshape(&[b, heads_kv, rows, seq_kv])?;
            let scores = client.add(&scores, &additive)?;
            // max - max is 0 for a row with any visible key and NaN for a fully
            // masked one; numr's softmax maps an all -inf row to zeros.
            let row_max = client.max(&scores, &[3], true)?;
            let masked_rows = client.sub(&row_max, &row_max)?;
            (scores, Some(masked_rows))
        }
        None => (scores, None),
    };

    let weights = client.softmax(&scores, -1)?;
    let weights = match masked_rows {
        Some(nan_bias) => client.add(&weights, &nan_bias)?,
        None => weights,
    };
    let weights = cast_if_needed(client, &weights, storage)?;

    // [B, H_kv, G*S_q, D_v] -> [B, H_q, S_q, D_v] -> [B, S_q, H_q, D_v]
    let out = client.matmul(&weights, &v.contiguous())?;
    let out = out
        .contiguous()
        .reshape(&[b, heads_q, seq_q, head_dim_v])?
        .permute(&[0, 2, 1, 3])?
        .contiguous();

    Ok(out)
}
