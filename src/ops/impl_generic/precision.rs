//! Compute-precision staging shared by the composite ops.
//!
//! Reductions and softmax run in f32 (f64 inputs stay f64); results are cast
//! back to the caller's storage dtype.

use crate::error::Result;
use numr::dtype::DType;
use numr::ops::TypeConversionOps;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Dtype the numerics are evaluated in for a given storage dtype.
pub fn compute_dtype(storage: DType) -> DType {
    match storage {
        DType::F64 => DType::F64,
        _ => DType::F32,
    }
}

/// Cast `t` to `dtype`, skipping the engine call when it already matches.
pub fn cast_if_needed<R, C>(client: &C, t: &Tensor<R>, dtype: DType) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: TypeConversionOps<R>,
{
    if t.dtype() == dtype {
        Ok(t.clone())
    } else {
        Ok(client.cast(t, dtype)?)
    }
}
