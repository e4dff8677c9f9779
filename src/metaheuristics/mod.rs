//! Derivative-free feature-subset search.
//!
//! The [`Aapso`] optimizer (Adaptive Accelerated Particle Swarm
//! Optimization) moves a swarm of continuous agents in `[0, 1]^D` toward
//! the global and personal bests with an annealed random walk. Agents are
//! binarized with a threshold to obtain feature masks, which a
//! [`FitnessFunction`] scores.
//!
//! # Example: selecting informative features
//!
//! ```
//! use aapso::metaheuristics::{Aapso, FnFitness, WORST_FITNESS};
//!
//! // features 0..3 carry the signal, the rest are noise
//! let fitness = FnFitness::new(10, |mask: &[bool]| {
//!     let useful = mask[..3].iter().filter(|&&m| m).count() as f64;
//!     let selected = mask.iter().filter(|&&m| m).count() as f64;
//!     0.9 * (useful / 3.0) + 0.1 * (1.0 - selected / 10.0)
//! });
//!
//! let result = Aapso::new()
//!     .with_population_size(8)
//!     .with_max_iter(10)
//!     .with_seed(42)
//!     .optimize(&fitness)
//!     .expect("valid configuration");
//!
//! assert!(result.best_fitness > WORST_FITNESS);
//! assert_eq!(result.convergence_curve.len(), 11);
//! ```
//!
//! # References
//!
//! - Yang, Deb & Fong (2011): Accelerated particle swarm optimization
//! - Kennedy & Eberhart (1995): Particle Swarm Optimization

mod aapso;
pub mod feature_selection;
mod traits;

pub use aapso::{Aapso, AapsoResult, Agent, Swarm};
pub use feature_selection::{
    select_features, validate_selection, FeatureSelectionResult, FitnessEvaluation,
    ValidationOptions, ValidationReport, WrapperFitness, WrapperOptions,
};
pub use traits::{FitnessFunction, FnFitness, WORST_FITNESS};
