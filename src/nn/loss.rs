//! Classification loss.
//!
//! # References
//!
//! - Bishop, C. M. (2006). Pattern Recognition and Machine Learning. Springer.

use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;

/// Reduction mode for the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Mean over the batch (default)
    #[default]
    Mean,
    /// Sum over the batch
    Sum,
}

/// Softmax cross-entropy over raw logits.
///
/// `forward` returns the reduced loss together with its gradient with
/// respect to the logits, `softmax(logits) - onehot(target)` scaled by the
/// reduction.
///
/// # Example
///
/// ```
/// use aapso::nn::CrossEntropyLoss;
/// use aapso::primitives::Tensor;
///
/// let logits = Tensor::new(vec![2.0, 0.0, 0.0, 0.0, 0.0, 2.0], &[2, 3]).expect("2x3");
/// let (loss, grad) = CrossEntropyLoss::new().forward(&logits, &[0, 2]).expect("valid");
/// assert!(loss > 0.0 && loss < 1.0);
/// assert_eq!(grad.shape(), &[2, 3]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    /// Mean-reduced cross-entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cross-entropy with an explicit reduction.
    #[must_use]
    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Loss and logit gradient for `logits` `[batch, classes]` and class `targets`.
    ///
    /// # Errors
    ///
    /// Returns an error on shape mismatch, an empty batch, or an
    /// out-of-range target.
    pub fn forward(&self, logits: &Tensor, targets: &[usize]) -> Result<(f32, Tensor)> {
        logits.expect_ndim(2, "CrossEntropyLoss logits")?;
        let (batch, classes) = (logits.dim(0), logits.dim(1));
        if batch != targets.len() {
            return Err(AapsoError::dimension_mismatch(
                "CrossEntropyLoss targets",
                batch,
                targets.len(),
            ));
        }
        if batch == 0 {
            return Err(AapsoError::empty_input("CrossEntropyLoss batch"));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= classes) {
            return Err(AapsoError::invalid_hyperparameter(
                "target",
                bad,
                &format!("< {classes} classes"),
            ));
        }

        let scale = match self.reduction {
            Reduction::Mean => 1.0 / batch as f32,
            Reduction::Sum => 1.0,
        };
        let mut grad = Tensor::zeros(logits.shape());
        let mut total = 0.0;
        for ((row, g), &t) in logits
            .data()
            .chunks(classes)
            .zip(grad.data_mut().chunks_mut(classes))
            .zip(targets)
        {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let sum_exp: f32 = row.iter().map(|&v| (v - max).exp()).sum();
            let log_z = max + sum_exp.ln();
            total += log_z - row[t];
            for (gj, &v) in g.iter_mut().zip(row) {
                *gj = (v - log_z).exp() * scale;
            }
            g[t] -= scale;
        }
        Ok((total * scale, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_logits_give_log_classes() {
        let logits = Tensor::zeros(&[4, 5]);
        let (loss, _) = CrossEntropyLoss::new()
            .forward(&logits, &[0, 1, 2, 3])
            .expect("valid");
        assert!((loss - 5.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_rows_sum_to_zero() {
        let logits = Tensor::new(vec![1.0, -2.0, 0.5, 3.0, 0.1, -1.0], &[2, 3]).expect("2x3");
        let (_, grad) = CrossEntropyLoss::new().forward(&logits, &[2, 0]).expect("valid");
        for row in grad.data().chunks(3) {
            assert!(row.iter().sum::<f32>().abs() < 1e-6);
        }
        assert!(grad.data()[2] < 0.0);
        assert!(grad.data()[3] < 0.0);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let ce = CrossEntropyLoss::new();
        let logits = Tensor::new(vec![0.2, -0.4, 1.1, 0.0, 0.7, -0.3], &[2, 3]).expect("2x3");
        let targets = [1, 2];
        let (_, grad) = ce.forward(&logits, &targets).expect("valid");
        let eps = 1e-2;
        for i in 0..6 {
            let mut p = logits.clone();
            p.data_mut()[i] += eps;
            let mut m = logits.clone();
            m.data_mut()[i] -= eps;
            let numeric = (ce.forward(&p, &targets).expect("valid").0
                - ce.forward(&m, &targets).expect("valid").0)
                / (2.0 * eps);
            assert!((numeric - grad.data()[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_large_logits_are_stable() {
        let logits = Tensor::new(vec![1000.0, 0.0], &[1, 2]).expect("1x2");
        let (loss, grad) = CrossEntropyLoss::new().forward(&logits, &[0]).expect("valid");
        assert!(loss.is_finite() && loss < 1e-6);
        assert!(grad.data().iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_sum_reduction_scales_loss() {
        let logits = Tensor::zeros(&[2, 2]);
        let mean = CrossEntropyLoss::new().forward(&logits, &[0, 1]).expect("valid").0;
        let sum = CrossEntropyLoss::with_reduction(Reduction::Sum)
            .forward(&logits, &[0, 1])
            .expect("valid")
            .0;
        assert!((sum - 2.0 * mean).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_targets() {
        let logits = Tensor::zeros(&[2, 3]);
        let ce = CrossEntropyLoss::new();
        assert!(ce.forward(&logits, &[0]).is_err());
        assert!(ce.forward(&logits, &[0, 3]).is_err());
        assert!(ce.forward(&Tensor::zeros(&[0, 3]), &[]).is_err());
    }
}
