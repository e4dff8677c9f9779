//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use aapso::prelude::*;
//! ```

pub use crate::classification::KNearestNeighbors;
pub use crate::config::ExperimentConfig;
pub use crate::data::{Compose, DataLoader, Dataset, ImageFolder};
pub use crate::error::{AapsoError, Result};
pub use crate::experiment::{run_experiment, ExperimentReport};
pub use crate::metaheuristics::{
    select_features, validate_selection, Aapso, FitnessFunction, ValidationOptions,
    WrapperFitness, WrapperOptions, WORST_FITNESS,
};
pub use crate::metrics::{accuracy, classification_report, confusion_matrix, f1_score, precision};
pub use crate::nn::{Module, Optimizer};
pub use crate::primitives::{Matrix, Tensor};
pub use crate::train::{extract_features, get_features, train_model, TrainOptions};
pub use crate::transfer::{BackboneKind, ConvNet, TransferEncoder};
