//! Wrapper feature selection and validation on extracted features.
//!
//! [`WrapperFitness`] scores a feature mask by training a k-NN on the
//! selected columns and blending its accuracy with the fraction of
//! features dropped:
//!
//! ```text
//! fitness = weight_acc * accuracy + (1 - weight_acc) * (1 - selected / D)
//! ```
//!
//! # Example
//!
//! ```
//! use aapso::metaheuristics::{select_features, Aapso, WrapperFitness};
//! use aapso::metaheuristics::feature_selection::WrapperOptions;
//! use aapso::primitives::Matrix;
//!
//! // column 0 separates the classes, column 1 is constant noise
//! let x = Matrix::from_vec(8, 2, vec![
//!     0.0, 1.0, 0.1, 1.0, 0.2, 1.0, 0.3, 1.0,
//!     5.0, 1.0, 5.1, 1.0, 5.2, 1.0, 5.3, 1.0,
//! ]).expect("8x2");
//! let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
//!
//! let options = WrapperOptions { k: 1, seed: Some(0), ..WrapperOptions::default() };
//! let optimizer = Aapso::new().with_population_size(4).with_max_iter(3).with_seed(1);
//! let result = select_features(&x, &y, &optimizer, options).expect("valid data");
//! assert!(result.n_selected >= 1);
//! ```

use super::aapso::Aapso;
use super::traits::{FitnessFunction, WORST_FITNESS};
use crate::classification::KNearestNeighbors;
use crate::error::{AapsoError, Result};
use crate::metrics::{
    classification_report, confusion_matrix_with_classes, f1_score, precision, Average,
};
use crate::metrics::ClassificationReport;
use crate::model_selection::{train_test_split, SplitIndices, StratifiedKFold};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// How the wrapper estimates classifier accuracy for a mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FitnessEvaluation {
    /// One stratified train/test split
    HoldOut {
        /// Fraction of samples held out for scoring
        test_size: f32,
    },
    /// Mean accuracy over stratified folds
    CrossValidation {
        /// Number of folds
        folds: usize,
    },
}

impl Default for FitnessEvaluation {
    fn default() -> Self {
        FitnessEvaluation::HoldOut { test_size: 0.2 }
    }
}

/// Tunables of [`WrapperFitness`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapperOptions {
    /// Neighbors used by the k-NN (capped at the training-split size)
    pub k: usize,
    /// Weight of accuracy against the subset-size term, in `[0, 1]`
    pub weight_acc: f64,
    /// Accuracy estimation scheme
    pub evaluation: FitnessEvaluation,
    /// Seed for the split(s); fixed once at construction
    pub seed: Option<u64>,
}

impl Default for WrapperOptions {
    fn default() -> Self {
        Self {
            k: 5,
            weight_acc: 0.9,
            evaluation: FitnessEvaluation::default(),
            seed: None,
        }
    }
}

/// k-NN wrapper fitness over a fixed feature matrix.
///
/// Splits are drawn once at construction, so repeated evaluations of the
/// same mask return the same value.
#[derive(Debug, Clone)]
pub struct WrapperFitness<'a> {
    x: &'a Matrix<f32>,
    y: &'a [usize],
    k: usize,
    weight_acc: f64,
    splits: Vec<SplitIndices>,
}

impl<'a> WrapperFitness<'a> {
    /// Build the wrapper, drawing the evaluation split(s).
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on the sample count, there
    /// are no features, an option is out of range, or no usable split exists.
    pub fn new(x: &'a Matrix<f32>, y: &'a [usize], options: WrapperOptions) -> Result<Self> {
        check_feature_matrix(x, y)?;
        if options.k == 0 {
            return Err(AapsoError::invalid_hyperparameter("k", options.k, ">= 1"));
        }
        if !(0.0..=1.0).contains(&options.weight_acc) {
            return Err(AapsoError::invalid_hyperparameter(
                "weight_acc",
                options.weight_acc,
                "in [0, 1]",
            ));
        }

        let splits = match options.evaluation {
            FitnessEvaluation::HoldOut { test_size } => {
                vec![train_test_split(y, test_size, options.seed)?]
            }
            FitnessEvaluation::CrossValidation { folds } => {
                if folds < 2 {
                    return Err(AapsoError::invalid_hyperparameter("folds", folds, ">= 2"));
                }
                let mut kfold = StratifiedKFold::new(folds);
                if let Some(seed) = options.seed {
                    kfold = kfold.with_random_state(seed);
                }
                kfold.split(y)
            }
        };
        if splits.is_empty() {
            return Err(AapsoError::empty_input("no usable evaluation split"));
        }

        Ok(Self {
            x,
            y,
            k: options.k,
            weight_acc: options.weight_acc,
            splits,
        })
    }

    /// Classifier accuracy on the columns selected by `mask`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask has the wrong length or selects nothing.
    pub fn accuracy(&self, mask: &[bool]) -> Result<f64> {
        let columns = selected_columns(mask, self.x.n_cols())?;
        let subset = self.x.select_columns(&columns);

        let mut total = 0.0;
        for (train, test) in &self.splits {
            let y_train: Vec<usize> = train.iter().map(|&i| self.y[i]).collect();
            let y_test: Vec<usize> = test.iter().map(|&i| self.y[i]).collect();

            let mut knn = KNearestNeighbors::new(self.k.min(train.len()));
            knn.fit(&subset.select_rows(train), &y_train)?;
            total += f64::from(knn.score(&subset.select_rows(test), &y_test)?);
        }
        Ok(total / self.splits.len() as f64)
    }

    /// Blend of accuracy and the fraction of unselected features.
    fn blend(&self, accuracy: f64, n_selected: usize) -> f64 {
        let dropped = 1.0 - n_selected as f64 / self.x.n_cols() as f64;
        self.weight_acc * accuracy + (1.0 - self.weight_acc) * dropped
    }
}

impl FitnessFunction for WrapperFitness<'_> {
    fn dimension(&self) -> usize {
        self.x.n_cols()
    }

    fn evaluate(&self, mask: &[bool]) -> f64 {
        let n_selected = mask.iter().filter(|&&m| m).count();
        if n_selected == 0 {
            return WORST_FITNESS;
        }
        match self.accuracy(mask) {
            Ok(acc) => self.blend(acc, n_selected),
            Err(e) => {
                warn!(error = %e, "wrapper evaluation failed; scoring mask as worst");
                WORST_FITNESS
            }
        }
    }
}

fn check_feature_matrix(x: &Matrix<f32>, y: &[usize]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(AapsoError::dimension_mismatch("labels", x.n_rows(), y.len()));
    }
    if x.n_rows() == 0 {
        return Err(AapsoError::empty_input("feature matrix has no samples"));
    }
    if x.n_cols() == 0 {
        return Err(AapsoError::empty_input("feature matrix has no features"));
    }
    Ok(())
}

fn selected_columns(mask: &[bool], n_features: usize) -> Result<Vec<usize>> {
    if mask.len() != n_features {
        return Err(AapsoError::dimension_mismatch("mask", n_features, mask.len()));
    }
    let columns: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, &m)| m)
        .map(|(i, _)| i)
        .collect();
    if columns.is_empty() {
        return Err(AapsoError::empty_input("feature mask selects no features"));
    }
    Ok(columns)
}

/// Result of feature selection.
#[derive(Debug, Clone)]
pub struct FeatureSelectionResult {
    /// Indices of selected features
    pub selected_indices: Vec<usize>,
    /// Number of selected features
    pub n_selected: usize,
    /// Best wrapper fitness
    pub score: f64,
    /// Wrapper accuracy of the best mask (None if it selects nothing)
    pub accuracy: Option<f64>,
    /// Boolean mask: true for selected features
    pub mask: Vec<bool>,
    /// Number of fitness evaluations used
    pub evaluations: usize,
    /// Global-best fitness per iteration, initialization first
    pub convergence_curve: Vec<f64>,
    /// Search duration
    pub execution_time: Duration,
}

/// Runs `optimizer` with a [`WrapperFitness`] over `x`/`y`.
///
/// # Errors
///
/// Returns an error if the data or options are invalid.
pub fn select_features(
    x: &Matrix<f32>,
    y: &[usize],
    optimizer: &Aapso,
    options: WrapperOptions,
) -> Result<FeatureSelectionResult> {
    let fitness = WrapperFitness::new(x, y, options)?;
    let result = optimizer.optimize(&fitness)?;

    let accuracy = fitness.accuracy(&result.best_mask).ok();
    let selected_indices = result.selected_indices();

    Ok(FeatureSelectionResult {
        n_selected: selected_indices.len(),
        selected_indices,
        score: result.best_fitness,
        accuracy,
        mask: result.best_mask,
        evaluations: result.evaluations,
        convergence_curve: result.convergence_curve,
        execution_time: result.execution_time,
    })
}

/// Tunables of [`validate_selection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOptions {
    /// Neighbors used by the k-NN (capped at the training-split size)
    pub k: usize,
    /// Fraction held out for the report
    pub test_size: f32,
    /// Split seed
    pub seed: Option<u64>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            k: 5,
            test_size: 0.2,
            seed: None,
        }
    }
}

/// Metrics of a k-NN retrained on the selected features.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Indices of the features used
    pub selected_indices: Vec<usize>,
    /// Accuracy on the held-out split
    pub accuracy: f32,
    /// Support-weighted precision
    pub precision: f32,
    /// Support-weighted F1
    pub f1: f32,
    /// Confusion matrix (true × predicted)
    pub confusion: Matrix<usize>,
    /// Per-class report
    pub report: ClassificationReport,
    /// Held-out true labels
    pub y_true: Vec<usize>,
    /// Held-out predictions
    pub y_pred: Vec<usize>,
}

/// Retrains a k-NN on the selected columns and reports its test metrics.
///
/// `labels[i]` names class `i` in the report. The report and the
/// confusion matrix cover every class of `y` and `labels`, including
/// classes that land entirely on the training side of the split.
///
/// # Errors
///
/// Returns an error if the mask is empty or mismatched, or the data cannot
/// be split.
pub fn validate_selection(
    x: &Matrix<f32>,
    y: &[usize],
    mask: &[bool],
    labels: &[String],
    options: ValidationOptions,
) -> Result<ValidationReport> {
    check_feature_matrix(x, y)?;
    let columns = selected_columns(mask, x.n_cols())?;
    let subset = x.select_columns(&columns);

    let (train, test) = train_test_split(y, options.test_size, options.seed)?;
    let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
    let y_true: Vec<usize> = test.iter().map(|&i| y[i]).collect();

    let mut knn = KNearestNeighbors::new(options.k.max(1).min(train.len()));
    knn.fit(&subset.select_rows(&train), &y_train)?;
    let y_pred = knn.predict(&subset.select_rows(&test))?;

    let n_classes = y.iter().max().map_or(0, |&m| m + 1).max(labels.len());
    let names: Vec<String> = (0..n_classes)
        .map(|c| labels.get(c).cloned().unwrap_or_else(|| c.to_string()))
        .collect();
    let report = classification_report(&y_pred, &y_true, &names);
    let validation = ValidationReport {
        selected_indices: columns,
        accuracy: report.accuracy,
        precision: precision(&y_pred, &y_true, Average::Weighted),
        f1: f1_score(&y_pred, &y_true, Average::Weighted),
        confusion: confusion_matrix_with_classes(&y_pred, &y_true, n_classes),
        report,
        y_true,
        y_pred,
    };

    info!(
        features = validation.selected_indices.len(),
        accuracy = validation.accuracy,
        precision = validation.precision,
        f1 = validation.f1,
        "feature subset validated"
    );
    Ok(validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 30 samples, 3 classes; column 0 separates the classes, 1..6 are noise.
    fn dataset() -> (Matrix<f32>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..30usize {
            let class = i % 3;
            let noise = |j: usize| ((i * 7 + j * 13) % 11) as f32 / 11.0;
            let mut row = vec![class as f32 * 10.0 + noise(0) * 0.5];
            row.extend((1..6).map(|j| noise(j) * 10.0));
            rows.push(row);
            y.push(class);
        }
        (Matrix::from_rows(&rows).expect("equal rows"), y)
    }

    fn options() -> WrapperOptions {
        WrapperOptions {
            k: 3,
            seed: Some(42),
            ..WrapperOptions::default()
        }
    }

    #[test]
    fn test_informative_column_scores_higher_than_noise() {
        let (x, y) = dataset();
        let fitness = WrapperFitness::new(&x, &y, options()).expect("valid data");

        let signal = [true, false, false, false, false, false];
        let noise = [false, true, true, false, false, false];
        assert!((fitness.accuracy(&signal).expect("valid mask") - 1.0).abs() < 1e-9);
        assert!(fitness.evaluate(&signal) > fitness.evaluate(&noise));
    }

    #[test]
    fn test_fitness_blend_penalizes_subset_size() {
        let (x, y) = dataset();
        let fitness = WrapperFitness::new(&x, &y, options()).expect("valid data");
        let one = fitness.blend(1.0, 1);
        let all = fitness.blend(1.0, 6);
        assert!((one - (0.9 + 0.1 * 5.0 / 6.0)).abs() < 1e-12);
        assert!((all - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mask_scores_worst() {
        let (x, y) = dataset();
        let fitness = WrapperFitness::new(&x, &y, options()).expect("valid data");
        assert_eq!(fitness.evaluate(&[false; 6]), WORST_FITNESS);
        assert!(fitness.accuracy(&[false; 6]).is_err());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let (x, y) = dataset();
        let fitness = WrapperFitness::new(&x, &y, options()).expect("valid data");
        let mask = [true, true, false, true, false, false];
        assert_eq!(fitness.evaluate(&mask), fitness.evaluate(&mask));
    }

    #[test]
    fn test_cross_validation_evaluation() {
        let (x, y) = dataset();
        let opts = WrapperOptions {
            evaluation: FitnessEvaluation::CrossValidation { folds: 5 },
            ..options()
        };
        let fitness = WrapperFitness::new(&x, &y, opts).expect("valid data");
        let acc = fitness
            .accuracy(&[true, false, false, false, false, false])
            .expect("valid mask");
        assert!((acc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constructor_validation() {
        let (x, y) = dataset();
        assert!(WrapperFitness::new(&x, &y[..10], options()).is_err());
        let bad_k = WrapperOptions { k: 0, ..options() };
        assert!(WrapperFitness::new(&x, &y, bad_k).is_err());
        let bad_w = WrapperOptions {
            weight_acc: 1.5,
            ..options()
        };
        assert!(WrapperFitness::new(&x, &y, bad_w).is_err());
        let bad_cv = WrapperOptions {
            evaluation: FitnessEvaluation::CrossValidation { folds: 1 },
            ..options()
        };
        assert!(WrapperFitness::new(&x, &y, bad_cv).is_err());
    }

    #[test]
    fn test_select_features_keeps_signal() {
        let (x, y) = dataset();
        let optimizer = Aapso::new()
            .with_population_size(10)
            .with_max_iter(10)
            .with_seed(7);
        let result = select_features(&x, &y, &optimizer, options()).expect("valid data");

        assert_eq!(result.mask.len(), 6);
        assert_eq!(result.selected_indices.len(), result.n_selected);
        assert!(result.selected_indices.contains(&0));
        assert!(result.accuracy.expect("non-empty mask") > 0.9);
        assert_eq!(result.convergence_curve.len(), 11);
    }

    #[test]
    fn test_validate_selection_reports_metrics() {
        let (x, y) = dataset();
        let labels: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        let mask = [true, false, false, false, false, false];
        let opts = ValidationOptions {
            k: 3,
            test_size: 0.2,
            seed: Some(1),
        };
        let report = validate_selection(&x, &y, &mask, &labels, opts).expect("valid");

        assert_eq!(report.selected_indices, vec![0]);
        assert!((report.accuracy - 1.0).abs() < 1e-6);
        assert!((report.precision - 1.0).abs() < 1e-6);
        assert!((report.f1 - 1.0).abs() < 1e-6);
        assert_eq!(report.confusion.shape(), (3, 3));
        assert_eq!(report.y_true.len(), report.y_pred.len());
        assert_eq!(report.report.classes[1].label, "b");
    }

    #[test]
    fn test_validate_selection_keeps_single_sample_class() {
        // class 2 has one sample, so the split keeps it on the training side
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for (class, count) in [(0usize, 10usize), (1, 10), (2, 1)] {
            for i in 0..count {
                rows.push(vec![class as f32 * 10.0 + i as f32 * 0.1, (i % 3) as f32]);
                y.push(class);
            }
        }
        let x = Matrix::from_rows(&rows).expect("equal rows");
        let labels: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        let opts = ValidationOptions {
            k: 3,
            test_size: 0.2,
            seed: Some(1),
        };
        let report = validate_selection(&x, &y, &[true, false], &labels, opts).expect("valid");

        assert!(!report.y_true.contains(&2));
        assert_eq!(report.confusion.shape(), (3, 3));
        assert_eq!(report.report.classes.len(), 3);
        assert_eq!(report.report.classes[2].label, "c");
        assert_eq!(report.report.classes[2].support, 0);
        assert!(crate::viz::render_confusion(&report.confusion, &labels, false).is_ok());
        assert!(crate::viz::confusion_image(&report.confusion).is_ok());
    }

    #[test]
    fn test_validate_selection_rejects_empty_mask() {
        let (x, y) = dataset();
        let err = validate_selection(&x, &y, &[false; 6], &[], ValidationOptions::default());
        assert!(err.is_err());
        let err = validate_selection(&x, &y, &[true; 3], &[], ValidationOptions::default());
        assert!(err.is_err());
    }
}
