//! Error types for the experiment runner.

use aapso::AapsoError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Config value or flag out of range, or unparsable config
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset layout or image problem
    #[error("Dataset error: {0}")]
    Data(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other pipeline failure
    #[error("Experiment failed: {0}")]
    Experiment(String),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Experiment(_) => ExitCode::from(1),
            Self::ConfigNotFound(_) => ExitCode::from(3),
            Self::InvalidConfig(_) => ExitCode::from(4),
            Self::Data(_) => ExitCode::from(5),
            Self::Io(_) => ExitCode::from(7),
        }
    }
}

impl From<AapsoError> for CliError {
    fn from(e: AapsoError) -> Self {
        match e {
            AapsoError::Io(io) => Self::Io(io),
            e @ (AapsoError::InvalidHyperparameter { .. } | AapsoError::Serialization(_)) => {
                Self::InvalidConfig(e.to_string())
            }
            e @ (AapsoError::Data { .. }
            | AapsoError::Image { .. }
            | AapsoError::EmptyDataset { .. }) => Self::Data(e.to_string()),
            other => Self::Experiment(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_errors_map_to_exit_classes() {
        let bad = AapsoError::invalid_hyperparameter("epochs", 0, ">= 1");
        assert!(matches!(CliError::from(bad), CliError::InvalidConfig(_)));

        let data = AapsoError::Data {
            path: PathBuf::from("train"),
            message: "no class directories found".into(),
        };
        assert!(matches!(CliError::from(data), CliError::Data(_)));

        let other = AapsoError::Other("boom".into());
        assert_eq!(
            CliError::from(other).exit_code(),
            ExitCode::from(1)
        );
    }
}
