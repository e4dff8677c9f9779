//! The [`Module`] trait and trainable [`Parameter`]s.

use crate::error::Result;
use crate::primitives::Tensor;

/// A trainable tensor with its accumulated gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Current value
    pub value: Tensor,
    /// Gradient accumulated by `backward`, same shape as `value`
    pub grad: Tensor,
    /// Frozen parameters keep their gradient at zero and are skipped by optimizers
    pub requires_grad: bool,
}

impl Parameter {
    /// Wraps `value` with a zero gradient.
    #[must_use]
    pub fn new(value: Tensor) -> Self {
        let grad = value.zeros_like();
        Self {
            value,
            grad,
            requires_grad: true,
        }
    }

    /// Shape of the value.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    /// Replaces the value, keeping the shape fixed.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` has a different shape.
    pub fn assign(&mut self, value: Tensor) -> Result<()> {
        if value.shape() != self.value.shape() {
            return Err(crate::error::AapsoError::DimensionMismatch {
                expected: format!("{:?}", self.value.shape()),
                actual: format!("{:?}", value.shape()),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Adds `grad` into the accumulated gradient unless frozen.
    pub(crate) fn accumulate(&mut self, grad: &[f32]) {
        if self.requires_grad {
            for (g, d) in self.grad.data_mut().iter_mut().zip(grad) {
                *g += d;
            }
        }
    }
}

/// A network layer with an explicit backward pass.
///
/// `forward` caches whatever the layer needs to compute gradients, and
/// `backward` consumes the gradient of the loss with respect to the layer
/// output, accumulates parameter gradients, and returns the gradient with
/// respect to the layer input. `backward` must follow a `forward` call.
pub trait Module {
    /// Computes the layer output.
    ///
    /// # Errors
    ///
    /// Returns an error if the input shape is not accepted by the layer.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Propagates `grad_output` back through the layer.
    ///
    /// # Errors
    ///
    /// Returns an error if no forward pass is cached or shapes disagree.
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor>;

    /// Parameters with their dotted names, e.g. `weight`, `3.bias`.
    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        Vec::new()
    }

    /// Mutable counterpart of [`Module::named_parameters`].
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        Vec::new()
    }

    /// All parameters, in the same order as `named_parameters`.
    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.named_parameters_mut()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    /// Clears every accumulated gradient.
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.grad.fill_zero();
        }
    }

    /// Switches between training and inference behavior.
    fn set_training(&mut self, _training: bool) {}

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.named_parameters()
            .iter()
            .map(|(_, p)| p.value.numel())
            .sum()
    }
}

/// Error for a `backward` call without a cached forward pass.
pub(crate) fn missing_forward(layer: &str) -> crate::error::AapsoError {
    crate::error::AapsoError::Other(format!("{layer}: backward called before forward"))
}
