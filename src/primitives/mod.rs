//! Core compute primitives (Matrix, Tensor).
//!
//! `Matrix` holds tabular data such as extracted feature matrices and
//! confusion matrices; `Tensor` holds N-dimensional activations flowing
//! through the convolutional network.

mod matrix;
mod tensor;

pub use matrix::Matrix;
pub use tensor::Tensor;
