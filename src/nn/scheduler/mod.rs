//! Learning-rate schedulers.
//!
//! Schedulers are stepped once per epoch and write the new learning rate
//! into the optimizer.

use super::optim::Optimizer;

/// Common trait for learning-rate schedulers.
pub trait LRScheduler {
    /// Advance one epoch and update the optimizer's learning rate.
    fn step(&mut self, optimizer: &mut dyn Optimizer);

    /// Number of completed `step` calls.
    fn last_epoch(&self) -> usize;
}

/// Decays the learning rate by `gamma` every `step_size` epochs.
///
/// ```text
/// lr = lr_0 * gamma ^ floor(epoch / step_size)
/// ```
#[derive(Debug, Clone)]
pub struct StepLR {
    step_size: usize,
    gamma: f32,
    epoch: usize,
}

impl StepLR {
    /// Create a StepLR scheduler. A `step_size` of 0 is treated as 1.
    #[must_use]
    pub fn new(step_size: usize, gamma: f32) -> Self {
        Self {
            step_size: step_size.max(1),
            gamma,
            epoch: 0,
        }
    }

    /// Epochs between decays.
    #[must_use]
    pub fn step_size(&self) -> usize {
        self.step_size
    }
}

impl LRScheduler for StepLR {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.epoch += 1;
        if self.epoch % self.step_size == 0 {
            optimizer.set_lr(optimizer.lr() * self.gamma);
        }
    }

    fn last_epoch(&self) -> usize {
        self.epoch
    }
}
