//! RMS Normalization module
//!
//! RMSNorm: output = x / sqrt(mean(x^2, last_dim) + eps) * weight
//! Used in LLaMA, Mistral, and other modern architectures.

use crate::config::NormConfig;
use crate::error::Result;
use crate::ops::FastNormOps;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// RMS Normalization layer
///
/// weight: `[hidden_size]`
pub struct RmsNorm<R: Runtime> {
    weight: Tensor<R>,
    eps: f32,
}

impl<R: Runtime> RmsNorm<R> {
    pub fn new(weight: Tensor<R>, eps: f32) -> Self {
        Self { weight, eps }
    }

    pub fn from_config(weight: Tensor<R>, config: &NormConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(weight, config.eps))
    }

    /// input: `[..., hidden_size]`, output: same shape
    pub fn forward<C>(&self, client: &C, input: &Tensor<R>) -> Result<Tensor<R>>
    where
        C: FastNormOps<R>,
    {
        client.fast_rms_norm(input, &self.weight, self.eps)
    }

    pub fn weight(&self) -> &Tensor<R> {
        &self.weight
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::runtime::cpu::CpuRuntime;

    #[test]
    fn test_rmsnorm_output_shape() {
        let (client, device) = cpu_setup();
        let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[4], &device);
        let norm = RmsNorm::new(weight, 1e-5);

        let input = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 12], &[3, 4], &device);
        let out = norm.forward(&client, &input).unwrap();
        assert_eq!(out.shape(), &[3, 4]);
    }

    #[test]
    fn test_rmsnorm_values() {
        let (client, device) = cpu_setup();
        let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[4], &device);
        let norm = RmsNorm::new(weight, 1e-6);

        let input = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[1, 4], &device);
        let data: Vec<f32> = norm.forward(&client, &input).unwrap().to_vec();

        // RMS = sqrt(mean([1,4,9,16])) = sqrt(7.5)
        let rms = (7.5f32).sqrt();
        for (i, &val) in data.iter().enumerate() {
            let expected = (i as f32 + 1.0) / rms;
            assert!(
                (val - expected).abs() < 1e-4,
                "idx={i}: got {val}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_rmsnorm_with_scale() {
        let (client, device) = cpu_setup();
        let weight = Tensor::<CpuRuntime>::from_slice(&[2.0f32; 4], &[4], &device);
        let norm = RmsNorm::from_config(weight, &NormConfig { eps: 1e-6 }).unwrap();

        let input = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[1, 4], &device);
        let data: Vec<f32> = norm.forward(&client, &input).unwrap().to_vec();

        let rms = (7.5f32).sqrt();
        for (i, &val) in data.iter().enumerate() {
            let expected = 2.0 * (i as f32 + 1.0) / rms;
            assert!((val - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_rmsnorm_rejects_zero_eps_config() {
        let (_client, device) = cpu_setup();
        let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[4], &device);
        assert!(RmsNorm::from_config(weight, &NormConfig { eps: 0.0 }).is_err());
    }
}
