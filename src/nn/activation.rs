//! Activation layers.
//!
//! # References
//!
//! - Nair, V., & Hinton, G. E. (2010). Rectified linear units improve restricted
//!   Boltzmann machines. ICML.

use super::module::{missing_forward, Module};
use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;

/// Rectified Linear Unit activation: ReLU(x) = max(0, x)
///
/// # Shape
///
/// - Input: `(*)` any shape
/// - Output: `(*)` same shape as input
///
/// # Example
///
/// ```
/// use aapso::nn::{Module, ReLU};
/// use aapso::primitives::Tensor;
///
/// let mut relu = ReLU::new();
/// let x = Tensor::new(vec![-1.0, 0.0, 1.0, 2.0], &[4]).expect("4 values");
/// let y = relu.forward(&x).expect("any shape");
/// assert_eq!(y.data(), &[0.0, 0.0, 1.0, 2.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    active: Option<Vec<bool>>,
}

impl ReLU {
    /// Create a new ReLU activation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ReLU {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut out = input.clone();
        out.data_mut().iter_mut().for_each(|v| *v = v.max(0.0));
        self.active = Some(input.data().iter().map(|&v| v > 0.0).collect());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let active = self.active.as_ref().ok_or_else(|| missing_forward("ReLU"))?;
        if active.len() != grad_output.numel() {
            return Err(AapsoError::dimension_mismatch(
                "ReLU grad",
                active.len(),
                grad_output.numel(),
            ));
        }
        let mut grad = grad_output.clone();
        for (g, &on) in grad.data_mut().iter_mut().zip(active) {
            if !on {
                *g = 0.0;
            }
        }
        Ok(grad)
    }
}
