//! Container modules for composing networks.

use super::module::{Module, Parameter};
use crate::error::Result;
use crate::primitives::Tensor;

/// Sequential container for chaining modules.
///
/// Modules run in order on `forward` and in reverse on `backward`.
/// Parameter names are prefixed with the module index, matching the
/// `features.{i}.weight` layout of torchvision checkpoints.
///
/// # Example
///
/// ```
/// use aapso::nn::{Dropout, Linear, Module, ReLU, Sequential};
/// use aapso::primitives::Tensor;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let mut model = Sequential::new()
///     .add(Linear::new(8, 4, &mut rng))
///     .add(ReLU::new())
///     .add(Dropout::with_seed(0.5, 0).expect("valid p"))
///     .add(Linear::new(4, 2, &mut rng));
///
/// let out = model.forward(&Tensor::zeros(&[3, 8])).expect("forward");
/// assert_eq!(out.shape(), &[3, 2]);
/// assert_eq!(model.named_parameters()[2].0, "3.weight");
/// ```
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl Sequential {
    /// Create an empty Sequential container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Add a module to the sequence.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a module by boxed trait object.
    #[must_use]
    pub fn add_boxed(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Get the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Runs only the first `n` modules.
    ///
    /// # Errors
    ///
    /// Propagates the first module error.
    pub fn forward_prefix(&mut self, input: &Tensor, n: usize) -> Result<Tensor> {
        let mut x = input.clone();
        for module in self.modules.iter_mut().take(n) {
            x = module.forward(&x)?;
        }
        Ok(x)
    }

    /// Whether the container is in training mode.
    #[must_use]
    pub fn training(&self) -> bool {
        self.training
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let n = self.modules.len();
        self.forward_prefix(input, n)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mut grad = grad_output.clone();
        for module in self.modules.iter_mut().rev() {
            grad = module.backward(&grad)?;
        }
        Ok(grad)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        self.modules
            .iter()
            .enumerate()
            .flat_map(|(i, m)| {
                m.named_parameters()
                    .into_iter()
                    .map(move |(name, p)| (format!("{i}.{name}"), p))
            })
            .collect()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        self.modules
            .iter_mut()
            .enumerate()
            .flat_map(|(i, m)| {
                m.named_parameters_mut()
                    .into_iter()
                    .map(move |(name, p)| (format!("{i}.{name}"), p))
            })
            .collect()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for module in &mut self.modules {
            module.set_training(training);
        }
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequential")
            .field("num_modules", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::gradcheck::{check_input_grad, check_param_grad};
    use crate::nn::{Linear, ReLU};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mlp() -> Sequential {
        let mut rng = StdRng::seed_from_u64(4);
        Sequential::new()
            .add(Linear::new(3, 5, &mut rng))
            .add(ReLU::new())
            .add(Linear::new(5, 2, &mut rng))
    }

    #[test]
    fn test_parameter_names_are_indexed() {
        let model = mlp();
        let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["0.weight", "0.bias", "2.weight", "2.bias"]);
        assert_eq!(model.num_parameters(), 3 * 5 + 5 + 5 * 2 + 2);
    }

    #[test]
    fn test_forward_prefix_stops_early() {
        let mut model = mlp();
        let x = Tensor::from_fn(&[4, 3], || 0.3);
        assert_eq!(model.forward_prefix(&x, 2).expect("prefix").shape(), &[4, 5]);
        assert_eq!(model.forward(&x).expect("full").shape(), &[4, 2]);
    }

    #[test]
    fn test_backward_chains_through_layers() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut model = Sequential::new()
            .add(Linear::new(3, 4, &mut rng))
            .add(Linear::new(4, 2, &mut rng));
        let x = Tensor::new(vec![0.5, -0.3, 0.8, 0.1, 0.9, -0.6], &[2, 3]).expect("2x3");
        check_input_grad(&mut model, &x, 1e-2);
        check_param_grad(&mut model, &x, 0, 1e-2);
        check_param_grad(&mut model, &x, 3, 1e-2);
    }

    #[test]
    fn test_set_training_propagates() {
        let mut model = mlp();
        model.set_training(false);
        assert!(!model.training());
        assert!(Sequential::new().is_empty());
    }
}
