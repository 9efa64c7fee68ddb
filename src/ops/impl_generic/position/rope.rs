//! Generic RoPE implementation
//!
//! Same algorithm on every backend.
//! Angle tables are built on the host; the rotation composes numr primitives:
//! narrow, mul, sub, add, cat.

use crate::config::{DEFAULT_ROPE_BASE, RopeScalingConfig, RopeScalingType};
use crate::error::{Error, Result};
use crate::ops::impl_generic::precision::{cast_if_needed, compute_dtype};
use crate::ops::traits::RoPEParams;
use numr::dtype::DType;
use numr::ops::{BinaryOps, ShapeOps, TypeConversionOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Per-pair angular frequencies `f_k = base^(-2k/dimensions)`, `k in 0..dimensions/2`,
/// optionally rescaled for context extension.
///
/// Evaluated in f64 so f64 inputs keep full precision; f32 callers narrow once
/// when the tables are built.
///
/// Supports:
/// - No scaling (standard RoPE)
/// - Linear scaling: `freq /= factor`
/// - Llama3: frequency-dependent scaling with low/high freq factors
pub fn rope_frequencies(
    dimensions: usize,
    base: f32,
    scaling: Option<&RopeScalingConfig>,
) -> Vec<f64> {
    let half = dimensions / 2;
    let base = base as f64;
    let mut freqs: Vec<f64> = (0..half)
        .map(|k| base.powf(-2.0 * k as f64 / dimensions as f64))
        .collect();

    if let Some(cfg) = scaling {
        let factor = cfg.factor as f64;
        match cfg.scaling_type {
            RopeScalingType::Linear => {
                for f in &mut freqs {
                    *f /= factor;
                }
            }
            RopeScalingType::Llama3 => {
                let old_context_len = cfg.original_max_position_embeddings.unwrap_or(8192) as f64;
                let low_freq_factor = cfg.low_freq_factor.unwrap_or(1.0) as f64;
                let high_freq_factor = cfg.high_freq_factor.unwrap_or(4.0) as f64;
                let low_freq_wavelen = old_context_len / low_freq_factor;
                let high_freq_wavelen = old_context_len / high_freq_factor;

                for f in &mut freqs {
                    let wavelen = 2.0 * std::f64::consts::PI / *f;
                    if wavelen < high_freq_wavelen {
                        // high frequency band is left alone
                    } else if wavelen > low_freq_wavelen {
                        *f /= factor;
                    } else {
                        let smooth = (old_context_len / wavelen - low_freq_factor)
                            / (high_freq_factor - low_freq_factor);
                        *f = (1.0 - smooth) * (*f / factor) + smooth * *f;
                    }
                }
            }
        }
    }

    freqs
}

/// Host cos/sin tables, each `[seq_len, freqs.len()]`.
///
/// Row `s` uses position `(offset + s) * scale`. Angles are taken in f64 so a
/// large `offset` does not lose the low bits of the position.
pub fn rope_tables(freqs: &[f64], seq_len: usize, offset: usize, scale: f32) -> (Vec<f64>, Vec<f64>) {
    let half = freqs.len();
    let mut cos = vec![0.0f64; seq_len * half];
    let mut sin = vec![0.0f64; seq_len * half];

    for s in 0..seq_len {
        let pos = (offset + s) as f64 * scale as f64;
        for (k, &f) in freqs.iter().enumerate() {
            let angle = pos * f;
            cos[s * half + k] = angle.cos();
            sin[s * half + k] = angle.sin();
        }
    }

    (cos, sin)
}

/// Host table as a tensor of the compute dtype.
fn table_tensor<R>(data: &[f64], shape: &[usize], compute: DType, device: &R::Device) -> Tensor<R>
where
    R: Runtime<DType = DType>,
{
    if compute == DType::F64 {
        Tensor::<R>::from_slice(data, shape, device)
    } else {
        let narrowed: Vec<f32> = data.iter().map(|&v| v as f32).collect();
        Tensor::<R>::from_slice(&narrowed, shape, device)
    }
}

/// Validated geometry of a RoPE call.
struct RopeGeometry {
    shape: Vec<usize>,
    lead: usize,
    seq_len: usize,
    d: usize,
    dims: usize,
    half: usize,
}

fn validate(shape: &[usize], params: &RoPEParams) -> Result<RopeGeometry> {
    if shape.len() < 2 {
        return Err(Error::InvalidArgument {
            arg: "x",
            reason: format!("expected at least 2D [..., S, D], got {}D", shape.len()),
        });
    }
    let ndim = shape.len();
    let d = shape[ndim - 1];
    let dims = params.dimensions;

    if dims == 0 || dims % 2 != 0 {
        return Err(Error::InvalidArgument {
            arg: "dimensions",
            reason: format!("must be even and > 0, got {}", dims),
        });
    }
    if dims > d {
        return Err(Error::ShapeMismatch {
            arg: "dimensions",
            reason: format!("{} exceeds last-axis extent {}", dims, d),
        });
    }
    if !params.scale.is_finite() {
        return Err(Error::InvalidArgument {
            arg: "scale",
            reason: format!("must be finite, got {}", params.scale),
        });
    }
    if let Some(base) = params.base {
        if !(base.is_finite() && base > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "base",
                reason: format!("must be positive, got {}", base),
            });
        }
    }

    Ok(RopeGeometry {
        shape: shape.to_vec(),
        lead: shape[..ndim - 2].iter().product(),
        seq_len: shape[ndim - 2],
        d,
        dims,
        half: dims / 2,
    })
}

/// Resolve `f_k`: explicit `freqs` win over `base`.
fn resolve_frequencies<R, C>(
    client: &C,
    params: &RoPEParams,
    half: usize,
    freqs: Option<&Tensor<R>>,
) -> Result<Vec<f64>>
where
    R: Runtime<DType = DType>,
    C: TypeConversionOps<R>,
{
    match freqs {
        Some(f) => {
            if f.shape() != [half] {
                return Err(Error::ShapeMismatch {
                    arg: "freqs",
                    reason: format!("expected [{}], got {:?}", half, f.shape()),
                });
            }
            tracing::debug!(half, "rope: using caller-supplied frequencies");
            let f = cast_if_needed(client, &f.contiguous(), DType::F64)?;
            Ok(f.to_vec::<f64>())
        }
        None => {
            let base = params.base.unwrap_or(DEFAULT_ROPE_BASE);
            tracing::debug!(base, half, "rope: geometric frequencies");
            Ok(rope_frequencies(params.dimensions, base, None))
        }
    }
}

/// `(a*cos - b*sin, a*sin + b*cos)`
fn rotate_pairs<R, C>(
    client: &C,
    a: &Tensor<R>,
    b: &Tensor<R>,
    cos: &Tensor<R>,
    sin: &Tensor<R>,
) -> Result<(Tensor<R>, Tensor<R>)>
where
    R: Runtime<DType = DType>,
    C: BinaryOps<R>,
{
    let a_cos = client.mul(a, cos)?;
    let b_sin = client.mul(b, sin)?;
    let out_a = client.sub(&a_cos, &b_sin)?;

    let a_sin = client.mul(a, sin)?;
    let b_cos = client.mul(b, cos)?;
    let out_b = client.add(&a_sin, &b_cos)?;

    Ok((out_a, out_b))
}

/// Apply Rotary Position Embedding to `x: [..., S, D]`.
///
/// Split-half (`traditional == false`), for `k < dims/2`:
///   y[k]          = x[k] * cos - x[k + dims/2] * sin
///   y[k + dims/2] = x[k] * sin + x[k + dims/2] * cos
///
/// Traditional pairs adjacent features `(x[2k], x[2k+1])` with the same rotation.
/// Features `dims..D` are copied through.
pub fn rope_impl<R, C>(
    client: &C,
    x: &Tensor<R>,
    params: &RoPEParams,
    freqs: Option<&Tensor<R>>,
) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R> + BinaryOps<R> + ShapeOps<R> + TypeConversionOps<R>,
{
    let g = validate(x.shape(), params)?;
    let freqs = resolve_frequencies(client, params, g.half, freqs)?;
    tracing::trace!(shape = ?g.shape, dims = g.dims, traditional = params.traditional, "rope");

    // Nothing to rotate; numr's cat rejects zero-sized pieces
    if x.numel() == 0 {
        return Ok(x.clone());
    }

    let storage = x.dtype();
    let compute = compute_dtype(storage);

    // Tables broadcast over the leading axes: [1, S, dims/2]
    let (cos_data, sin_data) = rope_tables(&freqs, g.seq_len, params.offset, params.scale);
    let cos = table_tensor::<R>(&cos_data, &[1, g.seq_len, g.half], compute, x.device());
    let sin = table_tensor::<R>(&sin_data, &[1, g.seq_len, g.half], compute, x.device());

    let x3 = cast_if_needed(client, x, compute)?
        .contiguous()
        .reshape(&[g.lead, g.seq_len, g.d])?;
    let rot = if g.dims == g.d {
        x3.clone()
    } else {
        x3.narrow(2, 0, g.dims)?.contiguous()
    };

    let rotated = if params.traditional {
        // [.., dims] -> [.., dims/2, 2]; evens and odds are the two pair members
        let pairs = rot.reshape(&[g.lead, g.seq_len, g.half, 2])?;
        let even = pairs
            .narrow(3, 0, 1)?
            .contiguous()
            .reshape(&[g.lead, g.seq_len, g.half])?;
        let odd = pairs
            .narrow(3, 1, 1)?
            .contiguous()
            .reshape(&[g.lead, g.seq_len, g.half])?;

        let (out_even, out_odd) = rotate_pairs(client, &even, &odd, &cos, &sin)?;
        let out_even = out_even.reshape(&[g.lead, g.seq_len, g.half, 1])?;
        let out_odd = out_odd.reshape(&[g.lead, g.seq_len, g.half, 1])?;
        client
            .cat(&[&out_even, &out_odd], 3)?
            .reshape(&[g.lead, g.seq_len, g.dims])?
    } else {
        let x1 = rot.narrow(2, 0, g.half)?.contiguous();
        let x2 = rot.narrow(2, g.half, g.half)?.contiguous();
        let (out1, out2) = rotate_pairs(client, &x1, &x2, &cos, &sin)?;
        client.cat(&[&out1, &out2], 2)?
    };

    let out = if g.dims < g.d {
        let pass = x3.narrow(2, g.dims, g.d - g.dims)?.contiguous();
        client.cat(&[&rotated, &pass], 2)?
    } else {
        rotated
    };

    let out = out.contiguous().reshape(&g.shape)?;
    cast_if_needed(client, &out, storage)
}
