//! CPU implementation of FastAttentionOps
//!
//! Dispatches between the fused decode kernel, the blocked streaming kernel and
//! the generic matmul/softmax/matmul composition. The host kernels are f32
//! kernels; f64 inputs always take the generic path.

use super::blocked::blocked_attention;
use super::decode::fused_decode_attention;
use super::host_mask::HostMask;
use crate::error::Result;
use crate::ops::cpu::host::{from_host_f32, to_host_f32};
use crate::ops::impl_generic::attention::sdpa::{general_attention, validate_dtypes};
use crate::ops::impl_generic::attention::{
    AttentionPath, broadcast_mask_shape, select_attention_path, validate_sdpa,
};
use crate::ops::traits::{AttentionMask, FastAttentionOps};
use numr::dtype::DType;
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

impl FastAttentionOps<CpuRuntime> for CpuClient {
    fn fast_scaled_dot_product_attention(
        &self,
        q: &Tensor<CpuRuntime>,
        k: &Tensor<CpuRuntime>,
        v: &Tensor<CpuRuntime>,
        scale: f32,
        mask: Option<&AttentionMask<CpuRuntime>>,
        memory_efficient_threshold: Option<usize>,
    ) -> Result<Tensor<CpuRuntime>> {
        let dims = validate_sdpa(q.shape(), k.shape(), v.shape(), scale)?;
        validate_dtypes(q, k, v)?;
        if let Some(shape) = mask.and_then(|m| m.shape()) {
            broadcast_mask_shape(shape, &dims)?;
        }

        let path = if q.dtype() == DType::F64 {
            AttentionPath::General
        } else {
            select_attention_path(&dims, memory_efficient_threshold)
        };
        tracing::debug!(?path, ?dims, "scaled_dot_product_attention");

        let output = match path {
            AttentionPath::General => {
                return general_attention(self, q, k, v, scale, mask, &dims);
            }
            AttentionPath::Decode => {
                let host_mask = HostMask::build(self, mask, &dims, q.device())?;
                fused_decode_attention(
                    &to_host_f32(self, q)?,
                    &to_host_f32(self, k)?,
                    &to_host_f32(self, v)?,
                    &host_mask,
                    &dims,
                    scale,
                )
            }
            AttentionPath::Blocked { block } => {
                let host_mask = HostMask::build(self, mask, &dims, q.device())?;
                blocked_attention(
                    &to_host_f32(self, q)?,
                    &to_host_f32(self, k)?,
                    &to_host_f32(self, v)?,
                    &host_mask,
                    &dims,
                    scale,
                    block,
                )
            }
        };

        from_host_f32(self, &output, &dims.output_shape(), q.dtype(), q.device())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;

    fn det(shape: &[usize], phase: f32) -> Tensor<CpuRuntime> {
        let n: usize = shape.iter().product();
        let data: Vec<f32> = (0..n).map(|i| ((i as f32 + phase) * 0.17).sin()).collect();
        Tensor::<CpuRuntime>::from_slice(&data, shape, &numr::runtime::cpu::CpuDevice::new())
    }

    #[test]
    fn test_decode_path_matches_general() {
        let (client, _device) = cpu_setup();
        let q = det(&[2, 4, 1, 16], 0.0);
        let k = det(&[2, 2, 11, 16], 3.0);
        let v = det(&[2, 2, 11, 8], 7.0);

        let fused = client
            .fast_scaled_dot_product_attention(&q, &k, &v, 0.25, None, None)
            .unwrap();
        let reference = general_attention(
            &client,
            &q,
            &k,
            &v,
            0.25,
            None,
            &validate_sdpa(q.shape(), k.shape(), v.shape(), 0.25).unwrap(),
        )
        .unwrap();

        assert_eq!(fused.shape(), &[2, 1, 4, 8]);
        for (a, b) in fused.to_vec::<f32>().iter().zip(reference.to_vec::<f32>().iter()) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_blocked_path_matches_general_with_causal() {
        let (client, _device) = cpu_setup();
        let q = det(&[1, 2, 6, 8], 1.0);
        let k = det(&[1, 2, 20, 8], 2.0);
        let v = det(&[1, 2, 20, 8], 5.0);
        let mask = AttentionMask::Causal;

        let streamed = client
            .fast_scaled_dot_product_attention(&q, &k, &v, 0.4, Some(&mask), Some(4))
            .unwrap();
        let full = client
            .fast_scaled_dot_product_attention(&q, &k, &v, 0.4, Some(&mask), None)
            .unwrap();

        for (a, b) in streamed.to_vec::<f32>().iter().zip(full.to_vec::<f32>().iter()) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_bad_mask_rejected_before_dispatch() {
        let (client, device) = cpu_setup();
        let q = det(&[1, 1, 1, 4], 0.0);
        let k = det(&[1, 1, 3, 4], 0.0);
        let mask = AttentionMask::Additive(Tensor::<CpuRuntime>::from_slice(&[0.0f32; 2], &[2], &device));
        let result = client.fast_scaled_dot_product_attention(&q, &k, &k, 1.0, Some(&mask), None);
        assert!(matches!(result, Err(crate::error::Error::ShapeMismatch { arg: "mask", .. })));
    }
}
