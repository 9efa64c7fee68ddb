//! Generic RMSNorm / LayerNorm implementation
//!
//! Same algorithm on every backend.
//! Composes numr primitives: mul, mean, add_scalar, sqrt, div, sub, add.

use crate::error::{Error, Result};
use crate::ops::impl_generic::precision::{cast_if_needed, compute_dtype};
use numr::dtype::DType;
use numr::ops::{BinaryOps, ReduceOps, ScalarOps, TypeConversionOps, UnaryOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

fn validate_eps(eps: f32) -> Result<()> {
    if !(eps.is_finite() && eps > 0.0) {
        return Err(Error::InvalidArgument {
            arg: "eps",
            reason: format!("must be a positive finite value, got {}", eps),
        });
    }
    Ok(())
}

/// Last-axis extent of `x`, which must have rank >= 1.
fn last_dim(shape: &[usize]) -> Result<usize> {
    shape.last().copied().ok_or_else(|| Error::InvalidArgument {
        arg: "x",
        reason: "expected at least 1D [..., D], got a scalar".into(),
    })
}

/// Affine parameters must be `[D]`.
fn validate_affine<R: Runtime>(arg: &'static str, t: &Tensor<R>, d: usize) -> Result<()> {
    if t.shape() != [d] {
        return Err(Error::ShapeMismatch {
            arg,
            reason: format!("expected [{}], got {:?}", d, t.shape()),
        });
    }
    Ok(())
}

/// Mean over the last axis, kept as a size-1 axis for broadcasting.
fn mean_last<R, C>(client: &C, t: &Tensor<R>) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: ReduceOps<R>,
{
    let axis = t.shape().len() - 1;
    Ok(client.mean(t, &[axis], true)?)
}

/// RMS normalization: `x / sqrt(mean(x^2) + eps) * weight`
///
/// - `x`: `[..., D]`
/// - `weight`: `[D]`
pub fn rms_norm_impl<R, C>(client: &C, x: &Tensor<R>, weight: &Tensor<R>, eps: f32) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R>
        + BinaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + UnaryOps<R>
        + TypeConversionOps<R>,
{
    let d = last_dim(x.shape())?;
    validate_affine("weight", weight, d)?;
    validate_eps(eps)?;

    let storage = x.dtype();
    let compute = compute_dtype(storage);
    let xc = cast_if_needed(client, &x.contiguous(), compute)?;

    let x_sq = client.mul(&xc, &xc)?;
    let mean_sq = mean_last(client, &x_sq)?;
    let mean_sq_eps = client.add_scalar(&mean_sq, eps as f64)?;
    let rms = client.sqrt(&mean_sq_eps)?;
    let normed = client.div(&xc, &rms)?;

    let weight = cast_if_needed(client, weight, compute)?;
    let out = client.mul(&normed, &weight)?;
    cast_if_needed(client, &out, storage)
}

/// Layer normalization: `(x - mean) / sqrt(var + eps) [* weight] [+ bias]`
///
/// - `x`: `[..., D]`
/// - `weight`, `bias`: optional `[D]`; an absent one skips its step
pub fn layer_norm_impl<R, C>(
    client: &C,
    x: &Tensor<R>,
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f32,
) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R>
        + BinaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + UnaryOps<R>
        + TypeConversionOps<R>,
{
    let d = last_dim(x.shape())?;
    if let Some(w) = weight {
        validate_affine("weight", w, d)?;
    }
    if let Some(b) = bias {
        validate_affine("bias", b, d)?;
    }
    validate_eps(eps)?;

    let storage = x.dtype();
    let compute = compute_dtype(storage);
    let xc = cast_if_needed(client, &x.contiguous(), compute)?;

    let mean = mean_last(client, &xc)?;
    let centered = client.sub(&xc, &mean)?;
    let sq = client.mul(&centered, &centered)?;
    let variance = mean_last(client, &sq)?;
    let var_eps = client.add_scalar(&variance, eps as f64)?;
    let std = client.sqrt(&var_eps)?;
    let mut out = client.div(&centered, &std)?;

    if let Some(w) = weight {
        let w = cast_if_needed(client, w, compute)?;
        out = client.mul(&out, &w)?;
    }
    if let Some(b) = bias {
        let b = cast_if_needed(client, b, compute)?;
        out = client.add(&out, &b)?;
    }

    cast_if_needed(client, &out, storage)
}
