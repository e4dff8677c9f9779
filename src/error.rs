//! Error types for feature-selection experiments.
//!
//! Provides rich error context for dataset loading, network training,
//! and the selection/validation stages.

use std::fmt;
use std::path::PathBuf;

/// Main error type for experiment operations.
///
/// # Examples
///
/// ```
/// use aapso::error::AapsoError;
///
/// let err = AapsoError::DimensionMismatch {
///     expected: "rows=100".to_string(),
///     actual: "90".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug)]
pub enum AapsoError {
    /// Matrix/tensor dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A dataset, split, or batch ended up with no samples.
    EmptyDataset {
        /// What was empty
        context: String,
    },

    /// Malformed dataset directory layout.
    Data {
        /// Offending path
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// Image decoding or encoding failed.
    Image {
        /// Image path
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error (config JSON, SafeTensors).
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for AapsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AapsoError::DimensionMismatch { expected, actual } => {
                write!(f, "Matrix dimension mismatch: expected {expected}, got {actual}")
            }
            AapsoError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            AapsoError::EmptyDataset { context } => write!(f, "Empty dataset: {context}"),
            AapsoError::Data { path, message } => {
                write!(f, "Dataset error at {}: {message}", path.display())
            }
            AapsoError::Image { path, message } => {
                write!(f, "Image error at {}: {message}", path.display())
            }
            AapsoError::Io(e) => write!(f, "I/O error: {e}"),
            AapsoError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            AapsoError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AapsoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AapsoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AapsoError {
    fn from(err: std::io::Error) -> Self {
        AapsoError::Io(err)
    }
}

impl From<serde_json::Error> for AapsoError {
    fn from(err: serde_json::Error) -> Self {
        AapsoError::Serialization(err.to_string())
    }
}

impl From<&str> for AapsoError {
    fn from(msg: &str) -> Self {
        AapsoError::Other(msg.to_string())
    }
}

impl From<String> for AapsoError {
    fn from(msg: String) -> Self {
        AapsoError::Other(msg)
    }
}

impl AapsoError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an invalid hyperparameter error
    #[must_use]
    pub fn invalid_hyperparameter(
        param: &str,
        value: impl fmt::Display,
        constraint: &str,
    ) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create an empty input error
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::EmptyDataset {
            context: context.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, AapsoError>;
