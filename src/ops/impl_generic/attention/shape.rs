//! Shape validation and path selection for scaled dot-product attention.

use crate::error::{Error, Result};

/// Largest key block the streaming path keeps scores for at once.
pub const MAX_KV_BLOCK: usize = 256;

/// Validated extents of an attention call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdpaDims {
    pub batch: usize,
    pub heads_q: usize,
    pub heads_kv: usize,
    pub seq_q: usize,
    pub seq_kv: usize,
    pub head_dim: usize,
    pub head_dim_v: usize,
}

impl SdpaDims {
    /// Query heads sharing one key/value head.
    pub fn group(&self) -> usize {
        self.heads_q / self.heads_kv
    }

    /// `[B, H_q, S_q, S_kv]`
    pub fn score_shape(&self) -> [usize; 4] {
        [self.batch, self.heads_q, self.seq_q, self.seq_kv]
    }

    /// `[B, S_q, H_q, D_v]`
    pub fn output_shape(&self) -> [usize; 4] {
        [self.batch, self.seq_q, self.heads_q, self.head_dim_v]
    }
}

/// Check q `[B, H_q, S_q, D]`, k `[B, H_kv, S_kv, D]`, v `[B, H_kv, S_kv, D_v]`.
pub fn validate_sdpa(q: &[usize], k: &[usize], v: &[usize], scale: f32) -> Result<SdpaDims> {
    for (arg, shape) in [("q", q), ("k", k), ("v", v)] {
        if shape.len() != 4 {
            return Err(Error::InvalidArgument {
                arg,
                reason: format!("expected 4D [B, H, S, D], got {}D", shape.len()),
            });
        }
    }
    if !scale.is_finite() {
        return Err(Error::InvalidArgument {
            arg: "scale",
            reason: format!("must be finite, got {}", scale),
        });
    }
    if q[0] != k[0] || k[0] != v[0] {
        return Err(Error::ShapeMismatch {
            arg: "k",
            reason: format!("batch differs: q={:?}, k={:?}, v={:?}", q, k, v),
        });
    }
    if q[3] != k[3] {
        return Err(Error::ShapeMismatch {
            arg: "k",
            reason: format!("head dim differs: q D={}, k D={}", q[3], k[3]),
        });
    }
    if k[1] != v[1] || k[2] != v[2] {
        return Err(Error::ShapeMismatch {
            arg: "v",
            reason: format!("k is {:?} but v is {:?} (H_kv, S_kv must match)", k, v),
        });
    }
    if k[1] == 0 || q[1] % k[1] != 0 {
        return Err(Error::ShapeMismatch {
            arg: "k",
            reason: format!(
                "query heads ({}) must be a multiple of key/value heads ({})",
                q[1], k[1]
            ),
        });
    }
    if k[2] == 0 {
        return Err(Error::InvalidArgument {
            arg: "k",
            reason: "attention over an empty key sequence".into(),
        });
    }

    Ok(SdpaDims {
        batch: q[0],
        heads_q: q[1],
        heads_kv: k[1],
        seq_q: q[2],
        seq_kv: k[2],
        head_dim: q[3],
        head_dim_v: v[3],
    })
}

/// Which kernel evaluates an attention call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionPath {
    /// Single query row per head: fused scores/softmax/accumulate
    Decode,
    /// Keys streamed in blocks with an online softmax
    Blocked { block: usize },
    /// matmul -> softmax -> matmul
    General,
}

pub fn select_attention_path(dims: &SdpaDims, memory_efficient_threshold: Option<usize>) -> AttentionPath {
    if dims.seq_q == 1 {
        return AttentionPath::Decode;
    }
    match memory_efficient_threshold {
        Some(threshold) if dims.seq_kv > threshold => AttentionPath::Blocked {
            block: threshold.clamp(1, MAX_KV_BLOCK),
        },
        _ => AttentionPath::General,
    }
}
