//! Error types for platepick-core.

use std::path::PathBuf;

use platepick_qc::RegressionError;
use thiserror::Error;

/// Main error type for the plate pipeline.
#[derive(Error, Debug)]
pub enum PickError {
    /// Too few standards levels to fit; the plate is skipped.
    #[error("insufficient standards: {groups} concentration level(s) usable, need at least 2")]
    InsufficientStandards { groups: usize },

    /// A tidy plate file lacks required columns or holds unreadable rows.
    /// Aborts a batching run.
    #[error("malformed plate input {}: {reason}", path.display())]
    MalformedPlateInput { path: PathBuf, reason: String },

    /// The standards list could not be parsed or does not fit the plate.
    #[error("invalid standards: {0}")]
    InvalidStandards(String),

    /// A plate-reader export could not be turned into a grid.
    #[error("grid parse error: {reason}")]
    GridParse { reason: String },

    /// The requested input format is not supported.
    #[error("unsupported file format '{0}' (supported: txt, table, csv)")]
    UnsupportedFormat(String),

    /// Configuration values are inconsistent or out of range.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Renaming a finished temporary file into place failed.
    #[error("could not persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<RegressionError> for PickError {
    fn from(err: RegressionError) -> Self {
        match err {
            RegressionError::InsufficientStandards { groups } => {
                Self::InsufficientStandards { groups }
            }
        }
    }
}

impl PickError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedPlateInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn grid(reason: impl Into<String>) -> Self {
        Self::GridParse {
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using [`PickError`].
pub type Result<T> = std::result::Result<T, PickError>;
