//! k-nearest-neighbor classification.
//!
//! The lightweight classifier behind the wrapper fitness and the final
//! validation of a selected feature subset.

use crate::error::{AapsoError, Result};
use crate::primitives::Matrix;
use std::collections::BTreeMap;

/// Distance metric for K-Nearest Neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceMetric {
    /// Euclidean distance: `sqrt(sum((x_i - y_i)^2))`
    Euclidean,
    /// Manhattan distance: `sum(|x_i - y_i|)`
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f32),
}

impl DistanceMetric {
    fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        let pairs = a.iter().zip(b);
        match self {
            DistanceMetric::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
            DistanceMetric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Minkowski(p) => pairs
                .map(|(x, y)| (x - y).abs().powf(p))
                .sum::<f32>()
                .powf(1.0 / p),
        }
    }
}

/// K-Nearest Neighbors classifier.
///
/// Instance-based learner: `fit` stores the training rows, `predict` votes
/// among the k closest of them. Votes are deterministic: equal distances
/// keep training order and equal vote counts resolve to the smallest label.
///
/// # Example
///
/// ```
/// use aapso::classification::KNearestNeighbors;
/// use aapso::primitives::Matrix;
///
/// let x = Matrix::from_vec(6, 2, vec![
///     0.0, 0.0,  // class 0
///     0.0, 1.0,  // class 0
///     1.0, 0.0,  // class 0
///     5.0, 5.0,  // class 1
///     5.0, 6.0,  // class 1
///     6.0, 5.0,  // class 1
/// ]).expect("6x2 matrix with 12 values");
/// let y = vec![0, 0, 0, 1, 1, 1];
///
/// let mut knn = KNearestNeighbors::new(3);
/// knn.fit(&x, &y).expect("Valid training data with 6 samples");
///
/// let test = Matrix::from_vec(1, 2, vec![0.5, 0.5]).expect("1x2 test matrix");
/// assert_eq!(knn.predict(&test).expect("fitted"), vec![0]);
/// ```
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    /// Number of neighbors to use
    k: usize,
    /// Distance metric
    metric: DistanceMetric,
    /// Whether to use weighted voting (inverse distance)
    weights: bool,
    /// Training feature matrix (stored during fit)
    x_train: Option<Matrix<f32>>,
    /// Training labels (stored during fit)
    y_train: Option<Vec<usize>>,
}

impl KNearestNeighbors {
    /// Creates a new classifier voting among `k` neighbors.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: DistanceMetric::Euclidean,
            weights: false,
            x_train: None,
            y_train: None,
        }
    }

    /// Sets the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Enables weighted voting (inverse distance weighting).
    #[must_use]
    pub fn with_weights(mut self, weights: bool) -> Self {
        self.weights = weights;
        self
    }

    /// Number of neighbors.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Stores the training data.
    ///
    /// # Errors
    ///
    /// Returns error if there are no samples, `x` and `y` disagree on the
    /// sample count, or `k` is zero or larger than the sample count.
    pub fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()> {
        let n_samples = x.n_rows();

        if n_samples == 0 {
            return Err(AapsoError::empty_input("kNN training set"));
        }
        if y.len() != n_samples {
            return Err(AapsoError::dimension_mismatch("labels", n_samples, y.len()));
        }
        if self.k == 0 || self.k > n_samples {
            return Err(AapsoError::invalid_hyperparameter(
                "k",
                self.k,
                &format!("1..={n_samples} (training samples)"),
            ));
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.to_vec());
        Ok(())
    }

    /// Predicts class labels for every row of `x`.
    ///
    /// # Errors
    ///
    /// Returns error if the model is not fitted or feature counts differ.
    pub fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err("Model not fitted".into()),
        };

        if x.n_cols() != x_train.n_cols() {
            return Err(AapsoError::dimension_mismatch(
                "features",
                x_train.n_cols(),
                x.n_cols(),
            ));
        }

        Ok((0..x.n_rows())
            .map(|i| self.predict_row(x.row(i), x_train, y_train))
            .collect())
    }

    /// Mean accuracy on the given test data and labels.
    ///
    /// # Errors
    ///
    /// Returns error if prediction fails or `y` has the wrong length.
    pub fn score(&self, x: &Matrix<f32>, y: &[usize]) -> Result<f32> {
        if y.len() != x.n_rows() {
            return Err(AapsoError::dimension_mismatch("labels", x.n_rows(), y.len()));
        }
        if y.is_empty() {
            return Err(AapsoError::empty_input("kNN scoring set"));
        }
        let predictions = self.predict(x)?;
        Ok(crate::metrics::accuracy(&predictions, y))
    }

    fn predict_row(&self, sample: &[f32], x_train: &Matrix<f32>, y_train: &[usize]) -> usize {
        let mut distances: Vec<(f32, usize)> = y_train
            .iter()
            .enumerate()
            .map(|(j, &label)| (self.metric.distance(sample, x_train.row(j)), label))
            .collect();

        // stable: equal distances keep training order
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nearest = &distances[..self.k];

        let mut votes: BTreeMap<usize, f32> = BTreeMap::new();
        for &(dist, label) in nearest {
            let weight = if self.weights {
                1.0 / (dist + 1e-10)
            } else {
                1.0
            };
            *votes.entry(label).or_insert(0.0) += weight;
        }

        let mut best = (usize::MAX, f32::NEG_INFINITY);
        for (label, weight) in votes {
            if weight > best.1 {
                best = (label, weight);
            }
        }
        best.0
    }
}
