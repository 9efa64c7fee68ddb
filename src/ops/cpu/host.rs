//! Host staging for the CPU kernels.
//!
//! Kernels read and write plain `f32` slices; these helpers move tensors of
//! any float dtype in and out of that form.

use crate::error::Result;
use numr::dtype::DType;
use numr::ops::TypeConversionOps;
use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use numr::tensor::Tensor;

/// Contiguous row-major copy of `t` as f32.
pub(crate) fn to_host_f32(client: &CpuClient, t: &Tensor<CpuRuntime>) -> Result<Vec<f32>> {
    let t = t.contiguous();
    if t.dtype() == DType::F32 {
        Ok(t.to_vec::<f32>())
    } else {
        Ok(client.cast(&t, DType::F32)?.to_vec::<f32>())
    }
}

/// Wrap host f32 data as a tensor of `dtype`.
pub(crate) fn from_host_f32(
    client: &CpuClient,
    data: &[f32],
    shape: &[usize],
    dtype: DType,
    device: &CpuDevice,
) -> Result<Tensor<CpuRuntime>> {
    let t = Tensor::<CpuRuntime>::from_slice(data, shape, device);
    if dtype == DType::F32 {
        Ok(t)
    } else {
        Ok(client.cast(&t, dtype)?)
    }
}
