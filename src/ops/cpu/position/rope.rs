//! CPU implementation of FastRoPEOps, delegates to impl_generic

use crate::error::Result;
use crate::ops::impl_generic::position::rope_impl;
use crate::ops::traits::{FastRoPEOps, RoPEParams};
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

impl FastRoPEOps<CpuRuntime> for CpuClient {
    fn fast_rope(
        &self,
        x: &Tensor<CpuRuntime>,
        params: &RoPEParams,
        freqs: Option<&Tensor<CpuRuntime>>,
    ) -> Result<Tensor<CpuRuntime>> {
        rope_impl(self, x, params, freqs)
    }
}
