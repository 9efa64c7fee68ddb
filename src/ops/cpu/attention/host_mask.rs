//! Mask lookup for the host attention kernels.
//!
//! Tensor masks are kept at their own (broadcast) shape and indexed with zero
//! strides on broadcast axes, so a `[S_q, S_kv]` mask is never expanded to
//! `[B, H_q, S_q, S_kv]`.

use crate::error::Result;
use crate::ops::cpu::host::to_host_f32;
use crate::ops::impl_generic::attention::{SdpaDims, causal_visible, mask_to_additive};
use crate::ops::traits::AttentionMask;
use numr::dtype::DType;
use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

pub(crate) enum HostMask {
    None,
    Causal { seq_q: usize, seq_kv: usize },
    Dense { data: Vec<f32>, strides: [usize; 4] },
}

impl HostMask {
    pub(crate) fn build(
        client: &CpuClient,
        mask: Option<&AttentionMask<CpuRuntime>>,
        dims: &SdpaDims,
        device: &CpuDevice,
    ) -> Result<Self> {
        let Some(mask) = mask else {
            return Ok(Self::None);
        };
        if let AttentionMask::Causal = mask {
            return Ok(Self::Causal {
                seq_q: dims.seq_q,
                seq_kv: dims.seq_kv,
            });
        }

        let additive = mask_to_additive(client, mask, dims, DType::F32, device)?;
        let shape = additive.shape().to_vec();
        let data = to_host_f32(client, &additive)?;

        let mut strides = [0usize; 4];
        let mut stride = 1;
        for axis in (0..4).rev() {
            if shape[axis] != 1 {
                strides[axis] = stride;
            }
            stride *= shape[axis];
        }
        Ok(Self::Dense { data, strides })
    }

    /// Additive bias for score `(b, h, i, j)`.
    #[inline]
    pub(crate) fn bias(&self, b: usize, h: usize, i: usize, j: usize) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Causal { seq_q, seq_kv } => {
                if causal_visible(i, j, *seq_q, *seq_kv) {
                    0.0
                } else {
                    f32::NEG_INFINITY
                }
            }
            Self::Dense { data, strides } => {
                data[b * strides[0] + h * strides[1] + i * strides[2] + j * strides[3]]
            }
        }
    }
}
