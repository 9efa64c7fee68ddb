//! CPU implementation of FastNormOps, delegates to impl_generic

use crate::error::Result;
use crate::ops::impl_generic::norm::{layer_norm_impl, rms_norm_impl};
use crate::ops::traits::FastNormOps;
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

impl FastNormOps<CpuRuntime> for CpuClient {
    fn fast_rms_norm(
        &self,
        x: &Tensor<CpuRuntime>,
        weight: &Tensor<CpuRuntime>,
        eps: f32,
    ) -> Result<Tensor<CpuRuntime>> {
        rms_norm_impl(self, x, weight, eps)
    }

    fn fast_layer_norm(
        &self,
        x: &Tensor<CpuRuntime>,
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        eps: f32,
    ) -> Result<Tensor<CpuRuntime>> {
        layer_norm_impl(self, x, weight, bias, eps)
    }
}
