//! Fused CPU decode attention kernel for S_q = 1
//!
//! When generating one token at a time (decode), the general path
//! (matmul → scale → softmax → matmul) creates several intermediate tensors.
//! This kernel fuses everything into a single pass per head:
//!
//!   1. score[j] = dot(q[h], k[kv_h][j]) * scale + mask(h, j)
//!   2. unnormalized softmax: subtract the max, exponentiate, sum
//!   3. output[h] = sum(weight[j] * v[kv_h][j]) / sum
//!
//! No tensor allocations. No GQA expansion: query heads index their KV head
//! directly.

use super::host_mask::HostMask;
use super::simd::{scale_in_place, score_rows, weighted_rows};
use crate::ops::impl_generic::attention::SdpaDims;

/// Q `[B, H_q, 1, D]` × K `[B, H_kv, S_kv, D]` × V `[B, H_kv, S_kv, D_v]`
/// → `[B, 1, H_q, D_v]` (host f32, contiguous).
pub(crate) fn fused_decode_attention(
    q: &[f32],
    k: &[f32],
    v: &[f32],
    mask: &HostMask,
    dims: &SdpaDims,
    scale: f32,
) -> Vec<f32> {
    debug_assert_eq!(dims.seq_q, 1);

    let SdpaDims {
        batch,
        heads_q,
        heads_kv,
        seq_kv,
        head_dim,
        head_dim_v,
        ..
    } = *dims;
    let group = dims.group();

    let mut output = vec![0.0f32; batch * heads_q * head_dim_v];

    // Sequential over heads: one query row per head is too little work to
    // amortize thread dispatch.
    let mut scores = vec![0.0f32; seq_kv];

    for b in 0..batch {
        for h in 0..heads_q {
            let kv_h = h / group;
            let q_offset = (b * heads_q + h) * head_dim;
            let k_base = (b * heads_kv + kv_h) * seq_kv * head_dim;
            let v_base = (b * heads_kv + kv_h) * seq_kv * head_dim_v;
            let q_row = &q[q_offset..q_offset + head_dim];

            // Phase 1: scores
            score_rows(q_row, &k[k_base..k_base + seq_kv * head_dim], scale, &mut scores);
            let mut max_score = f32::NEG_INFINITY;
            for (j, score) in scores.iter_mut().enumerate() {
                *score += mask.bias(b, h, 0, j);
                max_score = max_score.max(*score);
            }

            // Phase 2: softmax numerators (a fully masked row yields NaN, like the general path)
            let mut sum_exp = 0.0f32;
            for score in scores.iter_mut() {
                *score = (*score - max_score).exp();
                sum_exp += *score;
            }

            // Phase 3: weighted V
            let out_offset = (b * heads_q + h) * head_dim_v;
            let out_row = &mut output[out_offset..out_offset + head_dim_v];
            weighted_rows(out_row, &v[v_base..v_base + seq_kv * head_dim_v], &scores);
            scale_in_place(out_row, 1.0 / sum_exp);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::impl_generic::attention::validate_sdpa;

    #[test]
    fn test_single_key_returns_values() {
        // S_kv = 1: softmax over one element is 1, output is v regardless of q
        let dims = validate_sdpa(&[1, 4, 1, 3], &[1, 2, 1, 3], &[1, 2, 1, 2], 1.0).unwrap();
        let q = [9.0f32, -3.0, 1.0, 0.5, 0.5, 0.5, -7.0, 2.0, 2.0, 1.0, 1.0, 1.0];
        let k = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let v = [10.0f32, 20.0, 30.0, 40.0];
        let out = fused_decode_attention(&q, &k, &v, &HostMask::None, &dims, 0.7);
        assert_eq!(out, vec![10.0, 20.0, 10.0, 20.0, 30.0, 40.0, 30.0, 40.0]);
    }

    #[test]
    fn test_masked_key_is_ignored() {
        let dims = validate_sdpa(&[1, 1, 1, 2], &[1, 1, 2, 2], &[1, 1, 2, 2], 1.0).unwrap();
        let mask = HostMask::Dense {
            data: vec![0.0, f32::NEG_INFINITY],
            strides: [0, 0, 0, 1],
        };
        let q = [1.0f32, 1.0];
        let k = [0.3f32, 0.1, 5.0, 5.0];
        let v = [1.0f32, 2.0, 100.0, 200.0];
        let out = fused_decode_attention(&q, &k, &v, &mask, &dims, 1.0);
        assert_eq!(out, vec![1.0, 2.0]);
    }
}
