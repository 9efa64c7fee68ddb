//! Integration tests for RMS and layer normalization.

mod common;

use common::{assert_close, det_data, setup};
use fastops::config::NormConfig;
use fastops::error::Error;
use fastops::nn::{LayerNorm, RmsNorm};
use fastops::{DType, FastNormOps, Tensor};
use numr::ops::TypeConversionOps;
use numr::runtime::cpu::CpuRuntime;

const ROWS: usize = 6;
const D: usize = 16;

fn rows(device: &numr::runtime::cpu::CpuDevice) -> (Vec<f32>, Tensor<CpuRuntime>) {
    let data: Vec<f32> = det_data(ROWS * D, 0.0)
        .iter()
        .enumerate()
        .map(|(i, x)| x * (1.0 + (i / D) as f32) + (i / D) as f32)
        .collect();
    let t = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3, D], device);
    (data, t)
}

#[test]
fn test_rms_norm_unit_rms() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let ones = Tensor::<CpuRuntime>::from_slice(&[1.0f32; D], &[D], &device);

    let out = client.fast_rms_norm(&x, &ones, 1e-6).unwrap();
    assert_eq!(out.shape(), &[2, 3, D]);
    for row in out.to_vec::<f32>().chunks(D) {
        let rms = (row.iter().map(|v| v * v).sum::<f32>() / D as f32).sqrt();
        assert!((rms - 1.0).abs() < 1e-4, "rms = {rms}");
    }
}

#[test]
fn test_rms_norm_constant_row_is_sign() {
    let (client, device) = setup();
    let ones = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[4], &device);
    let x = Tensor::<CpuRuntime>::from_slice(
        &[3.0f32, 3.0, 3.0, 3.0, -0.5, -0.5, -0.5, -0.5],
        &[2, 4],
        &device,
    );
    let out = client.fast_rms_norm(&x, &ones, 1e-6).unwrap();
    assert_close(
        &out.to_vec::<f32>(),
        &[1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0],
        1e-5,
        "rms sign",
    );
}

#[test]
fn test_rms_norm_applies_weight_per_feature() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let ones = Tensor::<CpuRuntime>::from_slice(&[1.0f32; D], &[D], &device);
    let w: Vec<f32> = (0..D).map(|i| 0.5 + i as f32 * 0.1).collect();
    let weight = Tensor::<CpuRuntime>::from_slice(&w, &[D], &device);

    let plain = client.fast_rms_norm(&x, &ones, 1e-5).unwrap().to_vec::<f32>();
    let scaled = client.fast_rms_norm(&x, &weight, 1e-5).unwrap().to_vec::<f32>();
    let expected: Vec<f32> = plain.iter().enumerate().map(|(i, v)| v * w[i % D]).collect();
    assert_close(&scaled, &expected, 1e-5, "rms weight");
}

#[test]
fn test_layer_norm_zero_mean_unit_variance() {
    let (client, device) = setup();
    let (_, x) = rows(&device);

    let out = client.fast_layer_norm(&x, None, None, 1e-6).unwrap();
    for row in out.to_vec::<f32>().chunks(D) {
        let mean = row.iter().sum::<f32>() / D as f32;
        let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / D as f32;
        assert!(mean.abs() < 1e-5, "mean = {mean}");
        assert!((var - 1.0).abs() < 1e-3, "var = {var}");
    }
}

#[test]
fn test_layer_norm_without_affine_is_normalized_input() {
    let (client, device) = setup();
    let (data, x) = rows(&device);
    let eps = 1e-5f32;

    let expected: Vec<f32> = data
        .chunks(D)
        .flat_map(|row| {
            let mean = row.iter().map(|&v| v as f64).sum::<f64>() / D as f64;
            let var = row.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / D as f64;
            let inv = 1.0 / (var + eps as f64).sqrt();
            row.iter()
                .map(move |&v| ((v as f64 - mean) * inv) as f32)
                .collect::<Vec<_>>()
        })
        .collect();

    let out = client.fast_layer_norm(&x, None, None, eps).unwrap();
    assert_close(&out.to_vec::<f32>(), &expected, 1e-5, "layer norm plain");
}

#[test]
fn test_layer_norm_affine() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let w: Vec<f32> = (0..D).map(|i| 1.0 - i as f32 * 0.05).collect();
    let b: Vec<f32> = (0..D).map(|i| i as f32 * 0.25).collect();
    let weight = Tensor::<CpuRuntime>::from_slice(&w, &[D], &device);
    let bias = Tensor::<CpuRuntime>::from_slice(&b, &[D], &device);

    let plain = client.fast_layer_norm(&x, None, None, 1e-5).unwrap().to_vec::<f32>();
    let both = client
        .fast_layer_norm(&x, Some(&weight), Some(&bias), 1e-5)
        .unwrap()
        .to_vec::<f32>();
    let weight_only = client
        .fast_layer_norm(&x, Some(&weight), None, 1e-5)
        .unwrap()
        .to_vec::<f32>();

    let expect_both: Vec<f32> = plain
        .iter()
        .enumerate()
        .map(|(i, v)| v * w[i % D] + b[i % D])
        .collect();
    let expect_weight: Vec<f32> = plain.iter().enumerate().map(|(i, v)| v * w[i % D]).collect();
    assert_close(&both, &expect_both, 1e-5, "layer norm affine");
    assert_close(&weight_only, &expect_weight, 1e-5, "layer norm weight only");
}

#[test]
fn test_layer_norm_constant_row_is_zero() {
    let (client, device) = setup();
    let x = Tensor::<CpuRuntime>::from_slice(&[7.0f32; 8], &[8], &device);
    let out = client.fast_layer_norm(&x, None, None, 1e-5).unwrap();
    assert_close(&out.to_vec::<f32>(), &[0.0; 8], 1e-6, "layer norm constant");
}

#[test]
fn test_norms_keep_storage_dtype() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let x64 = client.cast(&x, DType::F64).unwrap();
    let ones = client
        .cast(&Tensor::<CpuRuntime>::from_slice(&[1.0f32; D], &[D], &device), DType::F64)
        .unwrap();

    let rms = client.fast_rms_norm(&x64, &ones, 1e-6).unwrap();
    let ln = client.fast_layer_norm(&x64, Some(&ones), None, 1e-6).unwrap();
    assert_eq!(rms.dtype(), DType::F64);
    assert_eq!(ln.dtype(), DType::F64);
    assert_eq!(ln.shape(), x.shape());
}

#[test]
fn test_norm_modules_from_config() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let config: NormConfig = serde_json::from_str(r#"{"rms_norm_eps": 1e-6}"#).unwrap();

    let ones = Tensor::<CpuRuntime>::from_slice(&[1.0f32; D], &[D], &device);
    let rms = RmsNorm::from_config(ones, &config).unwrap();
    let direct = client.fast_rms_norm(&x, rms.weight(), 1e-6).unwrap();
    assert_close(
        &rms.forward(&client, &x).unwrap().to_vec::<f32>(),
        &direct.to_vec::<f32>(),
        0.0,
        "rms module",
    );

    let ln = LayerNorm::<CpuRuntime>::from_config(None, None, &config).unwrap();
    let direct = client.fast_layer_norm(&x, None, None, 1e-6).unwrap();
    assert_close(
        &ln.forward(&client, &x).unwrap().to_vec::<f32>(),
        &direct.to_vec::<f32>(),
        0.0,
        "layer norm module",
    );
}

#[test]
fn test_norms_reject_bad_arguments() {
    let (client, device) = setup();
    let (_, x) = rows(&device);
    let ones = Tensor::<CpuRuntime>::from_slice(&[1.0f32; D], &[D], &device);
    let short = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[4], &device);

    let r = client.fast_rms_norm(&x, &short, 1e-5);
    assert!(matches!(r, Err(Error::ShapeMismatch { arg: "weight", .. })));

    let r = client.fast_layer_norm(&x, None, Some(&short), 1e-5);
    assert!(matches!(r, Err(Error::ShapeMismatch { arg: "bias", .. })));

    for eps in [0.0, -1e-5, f32::NAN] {
        let r = client.fast_rms_norm(&x, &ones, eps);
        assert!(matches!(r, Err(Error::InvalidArgument { arg: "eps", .. })));
        let r = client.fast_layer_norm(&x, None, None, eps);
        assert!(matches!(r, Err(Error::InvalidArgument { arg: "eps", .. })));
    }
}
