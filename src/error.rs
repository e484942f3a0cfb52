//! Error types shared by tree construction, the estimators and the dataset helpers.
//!
//! Only configuration and input problems are errors. Degenerate geometry (a zero-width
//! split dimension, duplicate points) is absorbed by the tree builder, and numeric
//! degeneracies are absorbed by the pruning logic, so a traversal that starts always
//! finishes with a numeric answer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bandwidth must be finite and positive, got {0}")]
    InvalidBandwidth(f64),

    #[error("Tolerance `{name}` must be finite and non-negative, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("Potential strength must be finite, got {0}")]
    InvalidStrength(f64),

    #[error("Leaf size must be at least 1")]
    InvalidLeafSize,

    #[error("Dimension mismatch: expected {expected} coordinates, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Point {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Rejects tolerances that are negative, NaN or infinite.
pub(crate) fn check_tolerance(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidTolerance { name, value })
    }
}
