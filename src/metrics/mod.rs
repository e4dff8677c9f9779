//! Evaluation metrics for the feature-selection classifiers.
//!
//! Classification metrics (accuracy, precision, recall, F1-score,
//! confusion matrix) and a per-class classification report.

pub mod classification;

pub use classification::{
    accuracy, classification_report, confusion_matrix, confusion_matrix_with_classes, f1_score,
    precision, recall, Average, ClassMetrics, ClassificationReport,
};
