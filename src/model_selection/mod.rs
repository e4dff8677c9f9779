//! Hold-out splitting and stratified cross-validation over label vectors.
//!
//! Splits are expressed as row indices so the same split can be applied
//! to any column subset of a feature matrix.

use crate::error::{AapsoError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Train/test row indices, each sorted ascending.
pub type SplitIndices = (Vec<usize>, Vec<usize>);

fn rng_from(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Groups row indices by class label, in ascending label order.
fn indices_by_class(y: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }
    by_class
}

/// Stratified hold-out split of row indices.
///
/// Every class with at least two samples contributes at least one sample to
/// each side; singleton classes stay in the training side.
///
/// # Errors
///
/// Returns an error if `test_size` is outside (0, 1) or either side would
/// be empty.
///
/// # Example
///
/// ```
/// use aapso::model_selection::train_test_split;
///
/// let y = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
/// let (train, test) = train_test_split(&y, 0.2, Some(42)).expect("valid split");
/// assert_eq!(train.len(), 8);
/// assert_eq!(test.len(), 2);
/// ```
pub fn train_test_split(
    y: &[usize],
    test_size: f32,
    random_state: Option<u64>,
) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AapsoError::invalid_hyperparameter(
            "test_size",
            test_size,
            "a fraction in (0, 1)",
        ));
    }

    let mut rng = rng_from(random_state);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for (_, mut indices) in indices_by_class(y) {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_test = if n > 1 {
            ((n as f32 * test_size).round() as usize).clamp(1, n - 1)
        } else {
            0
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(AapsoError::empty_input(&format!(
            "hold-out split of {} samples produced an empty side",
            y.len()
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Stratified K-Fold cross-validator.
///
/// Provides train/test indices that keep the class proportions of `y` in
/// every fold.
///
/// # Example
///
/// ```rust
/// use aapso::model_selection::StratifiedKFold;
///
/// let y = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2];
/// let skfold = StratifiedKFold::new(2).with_random_state(7);
/// assert_eq!(skfold.split(&y).len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    /// Create a new Stratified K-Fold cross-validator with `n_splits` folds.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Enable shuffling within each class before assigning folds.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducible shuffling (implies shuffling).
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true;
        self
    }

    /// Number of folds.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate stratified (train, test) index pairs, one per fold.
    ///
    /// Folds whose test side would be empty are skipped.
    #[must_use]
    pub fn split(&self, y: &[usize]) -> Vec<SplitIndices> {
        let n_splits = self.n_splits.max(2);
        let mut rng = rng_from(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];

        // Round-robin offset carries across classes so small classes do not
        // all land in fold 0.
        let mut offset = 0;
        for (_, mut indices) in indices_by_class(y) {
            if self.shuffle {
                indices.shuffle(&mut rng);
            }
            for (j, idx) in indices.into_iter().enumerate() {
                folds[(offset + j) % n_splits].push(idx);
            }
            offset += 1;
        }

        (0..n_splits)
            .filter(|&i| !folds[i].is_empty())
            .map(|i| {
                let mut test = folds[i].clone();
                let mut train: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                test.sort_unstable();
                train.sort_unstable();
                (train, test)
            })
            .filter(|(train, _)| !train.is_empty())
            .collect()
    }
}
