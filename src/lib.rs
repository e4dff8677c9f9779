//! aapso: transfer-learned CNN features with AAPSO wrapper feature selection.
//!
//! A single experiment fine-tunes a VGG-style network on an image folder,
//! extracts its penultimate-layer activations, searches for a compact
//! feature subset with Adaptive Accelerated Particle Swarm Optimization,
//! and validates the subset with a k-nearest-neighbor classifier.
//!
//! # Quick Start
//!
//! ```
//! use aapso::prelude::*;
//!
//! // 12 samples, 3 classes; only column 0 carries the label
//! let rows: Vec<Vec<f32>> = (0..12)
//!     .map(|i| vec![(i % 3) as f32 * 5.0, ((i * 7) % 5) as f32, ((i * 3) % 4) as f32])
//!     .collect();
//! let y: Vec<usize> = (0..12).map(|i| i % 3).collect();
//! let x = Matrix::from_rows(&rows).expect("equal rows");
//!
//! let optimizer = Aapso::new().with_population_size(6).with_max_iter(5).with_seed(7);
//! let options = WrapperOptions { k: 3, seed: Some(7), ..WrapperOptions::default() };
//! let result = select_features(&x, &y, &optimizer, options).expect("valid data");
//!
//! assert_eq!(result.convergence_curve.len(), 6);
//! assert!(result.n_selected >= 1);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: `Matrix` and `Tensor`
//! - [`data`]: image folders, transforms, and batching
//! - [`nn`]: layers, loss, Adam, and StepLR with explicit backward passes
//! - [`transfer`]: VGG backbones with a classification head
//! - [`train`]: fine-tuning loop and feature extraction
//! - [`metaheuristics`]: the AAPSO optimizer and wrapper fitness
//! - [`classification`]: k-nearest neighbors
//! - [`model_selection`]: stratified splits
//! - [`metrics`]: accuracy, precision, F1, confusion matrix, report
//! - [`serialization`]: `SafeTensors` weights
//! - [`viz`]: confusion-matrix heat-maps
//! - [`config`]: JSON experiment configuration
//! - [`experiment`]: the end-to-end pipeline

pub mod classification;
pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod metaheuristics;
pub mod metrics;
pub mod model_selection;
pub mod nn;
pub mod prelude;
pub mod primitives;
pub mod serialization;
pub mod train;
pub mod transfer;
pub mod viz;

pub use error::{AapsoError, Result};
pub use primitives::{Matrix, Tensor};
