//! Dropout regularization.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent neural
//!   networks from overfitting. JMLR.

use super::module::{missing_forward, Module};
use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Dropout regularization layer.
///
/// During training, randomly zeroes elements with probability `p` and scales
/// the survivors by `1/(1-p)` (inverted dropout). During evaluation the input
/// passes through unchanged.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    training: bool,
    rng: StdRng,
    /// Per-element multiplier of the last training forward pass
    scale: Option<Vec<f32>>,
}

impl Dropout {
    /// Create a dropout layer with an entropy-seeded RNG.
    ///
    /// # Errors
    ///
    /// Returns an error if `p` is not in [0, 1).
    pub fn new(p: f32) -> Result<Self> {
        Self::build(p, StdRng::from_entropy())
    }

    /// Create a dropout layer with a fixed seed.
    ///
    /// # Errors
    ///
    /// Returns an error if `p` is not in [0, 1).
    pub fn with_seed(p: f32, seed: u64) -> Result<Self> {
        Self::build(p, StdRng::seed_from_u64(seed))
    }

    fn build(p: f32, rng: StdRng) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(AapsoError::invalid_hyperparameter("dropout p", p, "in [0, 1)"));
        }
        Ok(Self {
            p,
            training: true,
            rng,
            scale: None,
        })
    }

    /// Drop probability.
    #[must_use]
    pub fn p(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if !self.training || self.p == 0.0 {
            self.scale = None;
            return Ok(input.clone());
        }
        let keep = 1.0 / (1.0 - self.p);
        let p = self.p;
        let scale: Vec<f32> = (0..input.numel())
            .map(|_| if self.rng.gen::<f32>() < p { 0.0 } else { keep })
            .collect();
        let mut out = input.clone();
        for (v, s) in out.data_mut().iter_mut().zip(&scale) {
            *v *= s;
        }
        self.scale = Some(scale);
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        if !self.training || self.p == 0.0 {
            return Ok(grad_output.clone());
        }
        let scale = self.scale.as_ref().ok_or_else(|| missing_forward("Dropout"))?;
        if scale.len() != grad_output.numel() {
            return Err(AapsoError::dimension_mismatch(
                "Dropout grad",
                scale.len(),
                grad_output.numel(),
            ));
        }
        let mut grad = grad_output.clone();
        for (g, s) in grad.data_mut().iter_mut().zip(scale) {
            *g *= s;
        }
        Ok(grad)
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_probability() {
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(-0.1).is_err());
        assert!(Dropout::new(0.0).is_ok());
    }

    #[test]
    fn test_eval_mode_is_identity() {
        let mut d = Dropout::with_seed(0.5, 1).expect("valid p");
        d.set_training(false);
        let x = Tensor::from_fn(&[4, 8], || 1.0);
        assert_eq!(d.forward(&x).expect("forward"), x);
    }

    #[test]
    fn test_training_mode_scales_survivors() {
        let mut d = Dropout::with_seed(0.5, 7).expect("valid p");
        let x = Tensor::from_fn(&[1000], || 1.0);
        let y = d.forward(&x).expect("forward");
        assert!(y.data().iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        let kept = y.data().iter().filter(|&&v| v > 0.0).count();
        assert!((400..600).contains(&kept), "kept {kept}");

        // gradient uses the same mask
        let g = d.backward(&x).expect("backward");
        assert_eq!(g, y);
    }

    #[test]
    fn test_seeded_masks_are_reproducible() {
        let x = Tensor::from_fn(&[64], || 1.0);
        let a = Dropout::with_seed(0.3, 5).expect("p").forward(&x).expect("forward");
        let b = Dropout::with_seed(0.3, 5).expect("p").forward(&x).expect("forward");
        assert_eq!(a, b);
    }
}
