//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

use super::init::{xavier_uniform, zeros};
use super::module::{missing_forward, Module, Parameter};
use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;
use rand::Rng;

/// Fully connected layer: y = xW^T + b
///
/// # Shape
///
/// - Input: `(N, in_features)`
/// - Output: `(N, out_features)`
///
/// # Example
///
/// ```
/// use aapso::nn::{Linear, Module};
/// use aapso::primitives::Tensor;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let mut layer = Linear::new(20, 30, &mut rng);
/// let x = Tensor::zeros(&[128, 20]);
/// let output = layer.forward(&x).expect("matching width");
/// assert_eq!(output.shape(), &[128, 30]);
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Parameter,
    /// Bias vector, shape: [out_features]
    bias: Parameter,
    in_features: usize,
    out_features: usize,
    input: Option<Tensor>,
}

impl Linear {
    /// Create a new Linear layer with Xavier initialization and zero bias.
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let weight = xavier_uniform(&[out_features, in_features], in_features, out_features, rng);
        Self {
            weight: Parameter::new(weight),
            bias: Parameter::new(zeros(&[out_features])),
            in_features,
            out_features,
            input: None,
        }
    }

    /// Get the input feature dimension.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Get the output feature dimension.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Weight parameter.
    #[must_use]
    pub fn weight(&self) -> &Parameter {
        &self.weight
    }
}

impl Module for Linear {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        input.expect_ndim(2, "Linear input")?;
        if input.dim(1) != self.in_features {
            return Err(AapsoError::dimension_mismatch(
                "Linear input features",
                self.in_features,
                input.dim(1),
            ));
        }
        let batch = input.dim(0);
        let w = self.weight.value.data();
        let b = self.bias.value.data();

        let mut out = Tensor::zeros(&[batch, self.out_features]);
        for (x, y) in input
            .data()
            .chunks(self.in_features)
            .zip(out.data_mut().chunks_mut(self.out_features))
        {
            for (o, yo) in y.iter_mut().enumerate() {
                let row = &w[o * self.in_features..(o + 1) * self.in_features];
                *yo = b[o] + row.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f32>();
            }
        }
        self.input = Some(input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.input.as_ref().ok_or_else(|| missing_forward("Linear"))?;
        let batch = input.dim(0);
        if grad_output.shape() != [batch, self.out_features] {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("[{batch}, {}]", self.out_features),
                actual: format!("{:?}", grad_output.shape()),
            });
        }

        let (fi, fo) = (self.in_features, self.out_features);
        let w = self.weight.value.data();
        let mut grad_w = vec![0.0; fo * fi];
        let mut grad_b = vec![0.0; fo];
        let mut grad_input = Tensor::zeros(&[batch, fi]);

        for ((x, gy), gx) in input
            .data()
            .chunks(fi)
            .zip(grad_output.data().chunks(fo))
            .zip(grad_input.data_mut().chunks_mut(fi))
        {
            for (o, &g) in gy.iter().enumerate() {
                grad_b[o] += g;
                let w_row = &w[o * fi..(o + 1) * fi];
                let gw_row = &mut grad_w[o * fi..(o + 1) * fi];
                for i in 0..fi {
                    gw_row[i] += g * x[i];
                    gx[i] += g * w_row[i];
                }
            }
        }

        self.weight.accumulate(&grad_w);
        self.bias.accumulate(&grad_b);
        Ok(grad_input)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        vec![("weight".into(), &self.weight), ("bias".into(), &self.bias)]
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        vec![
            ("weight".into(), &mut self.weight),
            ("bias".into(), &mut self.bias),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer() -> Linear {
        let mut l = Linear::new(3, 2, &mut StdRng::seed_from_u64(0));
        l.weight
            .assign(Tensor::new(vec![1.0, 0.0, -1.0, 0.5, 0.5, 0.5], &[2, 3]).expect("2x3"))
            .expect("same shape");
        l.bias
            .assign(Tensor::new(vec![0.1, -0.1], &[2]).expect("2"))
            .expect("same shape");
        l
    }

    #[test]
    fn test_forward_known_values() {
        let mut l = layer();
        let x = Tensor::new(vec![1.0, 2.0, 3.0], &[1, 3]).expect("1x3");
        let y = l.forward(&x).expect("forward");
        assert!((y.data()[0] - (1.0 - 3.0 + 0.1)).abs() < 1e-6);
        assert!((y.data()[1] - (3.0 - 0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_backward_gradients() {
        let mut l = layer();
        let x = Tensor::new(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], &[2, 3]).expect("2x3");
        l.forward(&x).expect("forward");
        let gy = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], &[2, 2]).expect("2x2");
        let gx = l.backward(&gy).expect("backward");

        // dL/dx = gy @ W
        assert_eq!(gx.data(), &[1.0, 0.0, -1.0, 0.5, 0.5, 0.5]);
        // dL/dW = gy^T @ x
        assert_eq!(
            l.weight.grad.data(),
            &[1.0, 2.0, 3.0, -1.0, 0.0, 1.0]
        );
        assert_eq!(l.bias.grad.data(), &[1.0, 1.0]);
    }

    #[test]
    fn test_frozen_parameters_keep_zero_grad() {
        let mut l = layer();
        for p in l.parameters_mut() {
            p.requires_grad = false;
        }
        let x = Tensor::new(vec![1.0, 2.0, 3.0], &[1, 3]).expect("1x3");
        l.forward(&x).expect("forward");
        l.backward(&Tensor::new(vec![1.0, 1.0], &[1, 2]).expect("1x2"))
            .expect("backward");
        assert!(l.weight.grad.data().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_rejects_wrong_width_and_missing_forward() {
        let mut l = layer();
        assert!(l.forward(&Tensor::zeros(&[1, 4])).is_err());
        assert!(l.backward(&Tensor::zeros(&[1, 2])).is_err());
    }

    #[test]
    fn test_parameter_names() {
        let l = layer();
        let names: Vec<String> = l.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["weight", "bias"]);
        assert_eq!(l.num_parameters(), 8);
    }
}
