//! Neural network building blocks for convolutional image classifiers.
//!
//! Layers implement the [`Module`] trait with an explicit backward pass:
//!
//! - **Layers**: [`Linear`], [`Conv2d`], [`Flatten`]
//! - **Pooling**: [`MaxPool2d`], [`GlobalAvgPool2d`]
//! - **Activations**: [`ReLU`]
//! - **Regularization**: [`Dropout`]
//! - **Containers**: [`Sequential`]
//! - **Training**: [`CrossEntropyLoss`], [`Adam`], [`StepLR`]
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.
//! - He, K., et al. (2015). Delving deep into rectifiers. ICCV.

mod activation;
mod container;
mod conv;
mod dropout;
#[cfg(test)]
mod gradcheck;
pub mod init;
mod linear;
pub mod loss;
mod module;
pub mod optim;
pub mod scheduler;

pub use activation::ReLU;
pub use container::Sequential;
pub use conv::{Conv2d, Flatten, GlobalAvgPool2d, MaxPool2d};
pub use dropout::Dropout;
pub use linear::Linear;
pub use loss::{CrossEntropyLoss, Reduction};
pub use module::{Module, Parameter};
pub use optim::{Adam, Optimizer};
pub use scheduler::{LRScheduler, StepLR};
