//! Image datasets, preprocessing, and batching.
//!
//! Expected layout:
//!
//! ```text
//! <data_directory>/train/<class>/*.{jpg,png,...}
//! <data_directory>/val/<class>/*.{jpg,png,...}
//! ```

mod image_folder;
mod loader;
pub mod transforms;

pub use image_folder::{ImageFolder, IMAGE_EXTENSIONS};
pub use loader::{Batch, BatchIter, DataLoader};
pub use transforms::{Compose, Normalize, RandomAffine, Transform, IMAGENET_MEAN, IMAGENET_STD};

use crate::error::Result;
use crate::primitives::Tensor;
use rand::rngs::StdRng;

/// Indexed collection of labeled samples.
pub trait Dataset {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Whether the dataset has no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads sample `index`; random transforms draw from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or loading fails.
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<(Tensor, usize)>;
}
