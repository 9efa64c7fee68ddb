//! Memory-efficient CPU attention.
//!
//! Keys are streamed in blocks of `block` rows. Each query row keeps a running
//! max `m`, running denominator `l` and an unnormalized accumulator; when a
//! block raises the max, the previous state is rescaled by `exp(m_old - m_new)`.
//! Peak scratch is one block of scores per worker instead of `S_q × S_kv`.

use super::host_mask::HostMask;
use super::simd::{scale_in_place, score_rows, weighted_rows};
use crate::ops::impl_generic::attention::SdpaDims;
use rayon::prelude::*;

/// Q `[B, H_q, S_q, D]` × K `[B, H_kv, S_kv, D]` × V `[B, H_kv, S_kv, D_v]`
/// → `[B, S_q, H_q, D_v]` (host f32, contiguous).
pub(crate) fn blocked_attention(
    q: &[f32],
    k: &[f32],
    v: &[f32],
    mask: &HostMask,
    dims: &SdpaDims,
    scale: f32,
    block: usize,
) -> Vec<f32> {
    let SdpaDims {
        batch,
        heads_q,
        heads_kv,
        seq_q,
        seq_kv,
        head_dim,
        head_dim_v,
    } = *dims;
    let group = dims.group();
    let block = block.max(1);

    // Computed per (batch, head) in [B, H_q, S_q, D_v], transposed at the end.
    let head_len = seq_q * head_dim_v;
    let mut by_head = vec![0.0f32; batch * heads_q * head_len];
    if head_len == 0 {
        return by_head;
    }

    by_head
        .par_chunks_mut(head_len)
        .enumerate()
        .for_each(|(bh, head_out)| {
            let b = bh / heads_q;
            let h = bh % heads_q;
            let kv_h = h / group;
            let k_base = (b * heads_kv + kv_h) * seq_kv * head_dim;
            let v_base = (b * heads_kv + kv_h) * seq_kv * head_dim_v;
            let mut scores = vec![0.0f32; block];

            for i in 0..seq_q {
                let q_offset = ((b * heads_q + h) * seq_q + i) * head_dim;
                let q_row = &q[q_offset..q_offset + head_dim];
                let acc = &mut head_out[i * head_dim_v..(i + 1) * head_dim_v];

                let mut running_max = f32::NEG_INFINITY;
                let mut running_sum = 0.0f32;

                for start in (0..seq_kv).step_by(block) {
                    let end = (start + block).min(seq_kv);
                    let block_scores = &mut scores[..end - start];

                    let keys = &k[k_base + start * head_dim..k_base + end * head_dim];
                    score_rows(q_row, keys, scale, block_scores);
                    let mut block_max = f32::NEG_INFINITY;
                    for (j, s) in (start..end).zip(block_scores.iter_mut()) {
                        *s += mask.bias(b, h, i, j);
                        block_max = block_max.max(*s);
                    }

                    let new_max = running_max.max(block_max);
                    if new_max == f32::NEG_INFINITY {
                        // everything so far is masked out
                        continue;
                    }

                    let correction = (running_max - new_max).exp();
                    if correction != 1.0 {
                        running_sum *= correction;
                        scale_in_place(acc, correction);
                    }

                    for s in block_scores.iter_mut() {
                        *s = (*s - new_max).exp();
                        running_sum += *s;
                    }
                    let values = &v[v_base + start * head_dim_v..v_base + end * head_dim_v];
                    weighted_rows(acc, values, block_scores);
                    running_max = new_max;
                }

                // running_sum == 0 only for a fully masked row: 0 * inf = NaN
                scale_in_place(acc, 1.0 / running_sum);
            }
        });

    // [B, H_q, S_q, D_v] -> [B, S_q, H_q, D_v]
    let mut output = vec![0.0f32; by_head.len()];
    for b in 0..batch {
        for h in 0..heads_q {
            for i in 0..seq_q {
                let src = ((b * heads_q + h) * seq_q + i) * head_dim_v;
                let dst = ((b * seq_q + i) * heads_q + h) * head_dim_v;
                output[dst..dst + head_dim_v].copy_from_slice(&by_head[src..src + head_dim_v]);
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::cpu::attention::decode::fused_decode_attention;
    use crate::ops::impl_generic::attention::validate_sdpa;

    fn det(n: usize, phase: f32) -> Vec<f32> {
        (0..n).map(|i| ((i as f32 + phase) * 0.23).cos()).collect()
    }

    #[test]
    fn test_block_size_does_not_change_result() {
        let dims = validate_sdpa(&[1, 2, 3, 4], &[1, 1, 10, 4], &[1, 1, 10, 4], 0.5).unwrap();
        let (q, k, v) = (det(24, 0.0), det(40, 1.0), det(40, 2.0));
        let whole = blocked_attention(&q, &k, &v, &HostMask::None, &dims, 0.5, 10);
        for block in [1, 3, 4, 7] {
            let streamed = blocked_attention(&q, &k, &v, &HostMask::None, &dims, 0.5, block);
            for (a, b) in whole.iter().zip(streamed.iter()) {
                assert!((a - b).abs() < 1e-5, "block={block}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_single_query_matches_decode_kernel() {
        let dims = validate_sdpa(&[2, 4, 1, 8], &[2, 2, 9, 8], &[2, 2, 9, 8], 0.35).unwrap();
        let (q, k, v) = (det(64, 0.5), det(288, 1.5), det(288, 2.5));
        let mask = HostMask::Causal { seq_q: 1, seq_kv: 9 };
        let decoded = fused_decode_attention(&q, &k, &v, &mask, &dims, 0.35);
        let blocked = blocked_attention(&q, &k, &v, &mask, &dims, 0.35, 2);
        for (a, b) in decoded.iter().zip(blocked.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_leading_masked_block_is_skipped() {
        // first block entirely masked: state must start from the second block
        let dims = validate_sdpa(&[1, 1, 1, 1], &[1, 1, 4, 1], &[1, 1, 4, 1], 1.0).unwrap();
        let mask = HostMask::Dense {
            data: vec![f32::NEG_INFINITY, f32::NEG_INFINITY, 0.0, 0.0],
            strides: [0, 0, 0, 1],
        };
        let out = blocked_attention(&[1.0], &[0.0; 4], &[5.0, 5.0, 1.0, 3.0], &mask, &dims, 1.0, 2);
        assert!((out[0] - 2.0).abs() < 1e-6);
    }
}
