//! Shared helpers for fastops integration tests.

#![allow(dead_code)]

use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use numr::tensor::Tensor;

pub fn setup() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuClient::new(device.clone());
    (client, device)
}

/// Deterministic pseudo-random data using a sin-based pattern.
pub fn det_data(n: usize, phase: f32) -> Vec<f32> {
    (0..n).map(|i| ((i as f32 + phase) * 0.37).sin() * 0.8).collect()
}

pub fn det_tensor(shape: &[usize], phase: f32, device: &CpuDevice) -> Tensor<CpuRuntime> {
    let n: usize = shape.iter().product();
    Tensor::<CpuRuntime>::from_slice(&det_data(n, phase), shape, device)
}

pub fn assert_close(a: &[f32], b: &[f32], tol: f32, op: &str) {
    assert_eq!(a.len(), b.len(), "{op}: length mismatch {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        assert!(diff <= tol, "{op} at index {i}: {x} vs {y} (diff={diff}, tol={tol})");
    }
}
