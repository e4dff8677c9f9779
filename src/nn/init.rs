//! Weight initialization.
//!
//! - Xavier/Glorot (Glorot & Bengio, 2010) for the classifier head
//! - Kaiming/He (He et al., 2015) for `ReLU` convolution stacks
//!
//! Every initializer draws from a caller-owned RNG so a seeded network is
//! reproducible layer by layer.

use crate::primitives::Tensor;
use rand::Rng;

/// Xavier uniform: U(-a, a) with a = sqrt(6 / (`fan_in` + `fan_out`)).
pub fn xavier_uniform<R: Rng + ?Sized>(
    shape: &[usize],
    fan_in: usize,
    fan_out: usize,
    rng: &mut R,
) -> Tensor {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    uniform(shape, -a, a, rng)
}

/// Kaiming normal: N(0, sqrt(2 / `fan`)).
///
/// torchvision initializes VGG convolutions with `fan = fan_out`.
pub fn kaiming_normal<R: Rng + ?Sized>(shape: &[usize], fan: usize, rng: &mut R) -> Tensor {
    let std = (2.0 / fan.max(1) as f32).sqrt();
    normal(shape, 0.0, std, rng)
}

/// Zero tensor, used for biases.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

pub(crate) fn uniform<R: Rng + ?Sized>(shape: &[usize], low: f32, high: f32, rng: &mut R) -> Tensor {
    Tensor::from_fn(shape, || rng.gen_range(low..high))
}

pub(crate) fn normal<R: Rng + ?Sized>(shape: &[usize], mean: f32, std: f32, rng: &mut R) -> Tensor {
    // Box-Muller
    Tensor::from_fn(shape, || {
        let u1: f32 = rng.gen_range(0.0001_f32..1.0_f32);
        let u2: f32 = rng.gen_range(0.0_f32..1.0_f32);
        let z = (-2.0_f32 * u1.ln()).sqrt() * (2.0_f32 * std::f32::consts::PI * u2).cos();
        mean + std * z
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xavier_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let t = xavier_uniform(&[16, 8], 8, 16, &mut rng);
        let a = (6.0f32 / 24.0).sqrt();
        assert_eq!(t.shape(), &[16, 8]);
        assert!(t.data().iter().all(|v| v.abs() <= a));
    }

    #[test]
    fn test_kaiming_normal_spread() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = kaiming_normal(&[4000], 8, &mut rng);
        let mean = t.data().iter().sum::<f32>() / 4000.0;
        let var = t.data().iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4000.0;
        assert!(mean.abs() < 0.05);
        assert!((var - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = xavier_uniform(&[3, 3], 3, 3, &mut StdRng::seed_from_u64(9));
        let b = xavier_uniform(&[3, 3], 3, 3, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
