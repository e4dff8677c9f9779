//! Fitness seam between the swarm and whatever scores a feature mask.

/// Fitness assigned to an agent that selects no features.
///
/// Strictly below every attainable score so a degenerate agent can never
/// become (or displace) the global best.
pub const WORST_FITNESS: f64 = f64::NEG_INFINITY;

/// Scores a binary feature mask; higher is better.
pub trait FitnessFunction {
    /// Number of candidate features (the mask length).
    fn dimension(&self) -> usize;

    /// Fitness of `mask`. Must not panic for an all-false mask.
    fn evaluate(&self, mask: &[bool]) -> f64;
}

/// Adapts a closure into a [`FitnessFunction`] of fixed dimension.
pub struct FnFitness<F> {
    dim: usize,
    f: F,
}

impl<F> FnFitness<F>
where
    F: Fn(&[bool]) -> f64,
{
    /// Wrap `f` as a fitness function over `dim` features.
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> FitnessFunction for FnFitness<F>
where
    F: Fn(&[bool]) -> f64,
{
    fn dimension(&self) -> usize {
        self.dim
    }

    fn evaluate(&self, mask: &[bool]) -> f64 {
        (self.f)(mask)
    }
}

impl<T: FitnessFunction + ?Sized> FitnessFunction for &T {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn evaluate(&self, mask: &[bool]) -> f64 {
        (**self).evaluate(mask)
    }
}
