//! Gradient-based optimizers.
//!
//! Optimizers update [`Parameter`]s from the gradients accumulated by
//! [`Module::backward`](crate::nn::Module::backward). Frozen parameters
//! (`requires_grad == false`) are skipped.
//!
//! # Example
//!
//! ```
//! use aapso::nn::{Adam, CrossEntropyLoss, Linear, Module, Optimizer};
//! use aapso::primitives::Tensor;
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let mut model = Linear::new(4, 2, &mut rng);
//! let mut optimizer = Adam::new(1e-3);
//! let x = Tensor::from_fn(&[3, 4], || 0.5);
//!
//! model.zero_grad();
//! let logits = model.forward(&x).expect("forward");
//! let (_, grad) = CrossEntropyLoss::new().forward(&logits, &[0, 1, 0]).expect("loss");
//! model.backward(&grad).expect("backward");
//! optimizer.step(&mut model.parameters_mut());
//! ```
//!
//! # References
//!
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic optimization. ICLR.

use super::module::Parameter;

/// Common trait for all optimizers.
pub trait Optimizer {
    /// Perform a single optimization step using accumulated gradients.
    ///
    /// `params` must be passed in the same order on every call; per-parameter
    /// state is keyed by position.
    fn step(&mut self, params: &mut [&mut Parameter]);

    /// Get current learning rate.
    fn lr(&self) -> f32;

    /// Set learning rate (for schedulers).
    fn set_lr(&mut self, lr: f32);
}

/// Adam optimizer.
///
/// Update rule (with bias correction):
/// ```text
/// m_t = β₁ m_{t-1} + (1 - β₁) g
/// v_t = β₂ v_{t-1} + (1 - β₂) g²
/// θ  -= lr · m̂_t / (√v̂_t + ε)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    weight_decay: f32,
    /// First moment estimates
    m: Vec<Vec<f32>>,
    /// Second moment estimates
    v: Vec<Vec<f32>>,
    /// Current timestep for bias correction
    pub(crate) t: usize,
}

impl Adam {
    /// Create a new Adam optimizer with default hyperparameters.
    ///
    /// Default: β₁=0.9, β₂=0.999, ε=1e-8
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Set beta parameters.
    #[must_use]
    pub fn betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Set epsilon for numerical stability.
    #[must_use]
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Set L2 weight decay (added to the gradient).
    #[must_use]
    pub fn weight_decay(mut self, wd: f32) -> Self {
        self.weight_decay = wd;
        self
    }

    fn update_param(&mut self, param: &mut Parameter, idx: usize) {
        if idx >= self.m.len() {
            self.m.resize(idx + 1, Vec::new());
            self.v.resize(idx + 1, Vec::new());
        }
        let n = param.value.numel();
        if self.m[idx].len() != n {
            self.m[idx] = vec![0.0; n];
            self.v[idx] = vec![0.0; n];
        }
        if !param.requires_grad {
            return;
        }

        let m = &mut self.m[idx];
        let v = &mut self.v[idx];
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        let grad = param.grad.data();
        let value = param.value.data_mut();
        for i in 0..n {
            let mut g = grad[i];
            if self.weight_decay != 0.0 {
                g += self.weight_decay * value[i];
            }
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = m[i] / bias_correction1;
            let v_hat = v[i] / bias_correction2;
            value[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Parameter]) {
        self.t += 1;
        for (idx, param) in params.iter_mut().enumerate() {
            self.update_param(param, idx);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
