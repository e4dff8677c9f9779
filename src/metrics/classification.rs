//! Classification metrics for evaluating classifier performance.
//!
//! Provides accuracy, precision, recall, F1-score, confusion matrix and a
//! per-class report for multi-class label vectors (`usize` class indices).

use crate::primitives::Matrix;
use std::fmt;

/// Averaging strategy for multi-class metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Average {
    /// Calculate metrics for each label, return unweighted mean.
    Macro,
    /// Calculate metrics globally by counting total TP, FP, FN.
    Micro,
    /// Weighted mean by support (number of true instances per label).
    Weighted,
}

/// Per-class true positive / false positive / false negative tallies.
#[derive(Debug, Clone)]
struct Counts {
    tp: Vec<usize>,
    fp: Vec<usize>,
    fn_: Vec<usize>,
    support: Vec<usize>,
}

impl Counts {
    /// Sized for at least `min_classes` classes.
    fn tally(y_pred: &[usize], y_true: &[usize], min_classes: usize) -> Self {
        assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
        assert!(!y_true.is_empty(), "Vectors cannot be empty");

        let n_classes = n_classes(y_pred, y_true).max(min_classes);
        let mut counts = Self {
            tp: vec![0; n_classes],
            fp: vec![0; n_classes],
            fn_: vec![0; n_classes],
            support: vec![0; n_classes],
        };

        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts.support[t] += 1;
            if t == p {
                counts.tp[t] += 1;
            } else {
                counts.fp[p] += 1;
                counts.fn_[t] += 1;
            }
        }
        counts
    }

    fn n_classes(&self) -> usize {
        self.support.len()
    }

    fn precision(&self, c: usize) -> f32 {
        ratio(self.tp[c], self.tp[c] + self.fp[c])
    }

    fn recall(&self, c: usize) -> f32 {
        ratio(self.tp[c], self.tp[c] + self.fn_[c])
    }

    fn f1(&self, c: usize) -> f32 {
        harmonic(self.precision(c), self.recall(c))
    }

    /// Averages a per-class score; `micro` is the globally pooled value.
    fn average(&self, average: Average, per_class: impl Fn(usize) -> f32, micro: f32) -> f32 {
        let k = self.n_classes();
        match average {
            Average::Micro => micro,
            Average::Macro => (0..k).map(&per_class).sum::<f32>() / k as f32,
            Average::Weighted => {
                let total: usize = self.support.iter().sum();
                if total == 0 {
                    return 0.0;
                }
                (0..k)
                    .map(|c| per_class(c) * self.support[c] as f32 / total as f32)
                    .sum()
            }
        }
    }

    fn micro_precision(&self) -> f32 {
        let tp: usize = self.tp.iter().sum();
        ratio(tp, tp + self.fp.iter().sum::<usize>())
    }

    fn micro_recall(&self) -> f32 {
        let tp: usize = self.tp.iter().sum();
        ratio(tp, tp + self.fn_.iter().sum::<usize>())
    }
}

fn n_classes(y_pred: &[usize], y_true: &[usize]) -> usize {
    y_true.iter().chain(y_pred).max().map_or(0, |&m| m + 1)
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

fn harmonic(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Compute classification accuracy.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use aapso::metrics::accuracy;
///
/// let y_true = vec![0, 1, 2, 0, 1, 2];
/// let y_pred = vec![0, 2, 1, 0, 0, 1];
/// assert!((accuracy(&y_pred, &y_true) - 0.333333).abs() < 0.001);
/// ```
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let correct = y_pred.iter().zip(y_true).filter(|(p, t)| p == t).count();
    correct as f32 / y_true.len() as f32
}

/// Compute precision, TP / (TP + FP).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn precision(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    let counts = Counts::tally(y_pred, y_true, 0);
    counts.average(average, |c| counts.precision(c), counts.micro_precision())
}

/// Compute recall, TP / (TP + FN).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn recall(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    let counts = Counts::tally(y_pred, y_true, 0);
    counts.average(average, |c| counts.recall(c), counts.micro_recall())
}

/// Compute F1 score (harmonic mean of precision and recall).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use aapso::metrics::{f1_score, Average};
///
/// let y_true = vec![0, 1, 2, 0, 1, 2];
/// let y_pred = vec![0, 2, 1, 0, 0, 1];
/// let f1 = f1_score(&y_pred, &y_true, Average::Weighted);
/// assert!((0.0..=1.0).contains(&f1));
/// ```
#[must_use]
pub fn f1_score(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    let counts = Counts::tally(y_pred, y_true, 0);
    let micro = harmonic(counts.micro_precision(), counts.micro_recall());
    counts.average(average, |c| counts.f1(c), micro)
}

/// Compute confusion matrix.
///
/// Element `[i, j]` counts samples with true label `i` predicted as `j`.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use aapso::metrics::confusion_matrix;
///
/// let y_true = vec![0, 0, 1, 1, 2, 2];
/// let y_pred = vec![0, 1, 1, 1, 2, 0];
/// let cm = confusion_matrix(&y_pred, &y_true);
/// assert_eq!(cm.shape(), (3, 3));
/// assert_eq!(cm.get(0, 1), 1);
/// ```
#[must_use]
pub fn confusion_matrix(y_pred: &[usize], y_true: &[usize]) -> Matrix<usize> {
    confusion_matrix_with_classes(y_pred, y_true, 0)
}

/// Confusion matrix with at least `n_classes` rows and columns.
///
/// Classes absent from both label vectors still get an all-zero row and
/// column, so the shape matches the full label set of the dataset.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use aapso::metrics::confusion_matrix_with_classes;
///
/// let cm = confusion_matrix_with_classes(&[0, 1], &[0, 1], 3);
/// assert_eq!(cm.shape(), (3, 3));
/// assert_eq!(cm.row_sums(), vec![1, 1, 0]);
/// ```
#[must_use]
pub fn confusion_matrix_with_classes(
    y_pred: &[usize],
    y_true: &[usize],
    n_classes: usize,
) -> Matrix<usize> {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let k = self::n_classes(y_pred, y_true).max(n_classes);
    let mut cm = Matrix::<usize>::zeros(k, k);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        cm.set(t, p, cm.get(t, p) + 1);
    }
    cm
}

/// Precision/recall/F1/support for a single class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// Display name of the class
    pub label: String,
    /// Precision for this class
    pub precision: f32,
    /// Recall for this class
    pub recall: f32,
    /// F1 score for this class
    pub f1: f32,
    /// Number of true instances
    pub support: usize,
}

/// Per-class metrics plus accuracy and macro/weighted averages.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    /// One entry per class index
    pub classes: Vec<ClassMetrics>,
    /// Overall accuracy
    pub accuracy: f32,
    /// Unweighted mean over classes
    pub macro_avg: ClassMetrics,
    /// Support-weighted mean over classes
    pub weighted_avg: ClassMetrics,
}

/// Build a classification report.
///
/// `labels[i]` names class `i`; missing names fall back to the index.
/// Every labelled class gets a row, even with zero support.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn classification_report(
    y_pred: &[usize],
    y_true: &[usize],
    labels: &[String],
) -> ClassificationReport {
    let counts = Counts::tally(y_pred, y_true, labels.len());
    let total: usize = counts.support.iter().sum();

    let classes = (0..counts.n_classes())
        .map(|c| ClassMetrics {
            label: labels.get(c).cloned().unwrap_or_else(|| c.to_string()),
            precision: counts.precision(c),
            recall: counts.recall(c),
            f1: counts.f1(c),
            support: counts.support[c],
        })
        .collect();

    let summary = |name: &str, average: Average| ClassMetrics {
        label: name.to_string(),
        precision: counts.average(average, |c| counts.precision(c), 0.0),
        recall: counts.average(average, |c| counts.recall(c), 0.0),
        f1: counts.average(average, |c| counts.f1(c), 0.0),
        support: total,
    };

    ClassificationReport {
        classes,
        accuracy: accuracy(y_pred, y_true),
        macro_avg: summary("macro avg", Average::Macro),
        weighted_avg: summary("weighted avg", Average::Weighted),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            write_row(f, c, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, c: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
        c.label, c.precision, c.recall, c.f1, c.support
    )
}

#[cfg(test)]
#[path = "tests_classification_contract.rs"]
mod tests_classification_contract;
