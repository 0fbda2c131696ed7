use pyo3::exceptions::{PyKeyError, PyTypeError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

/// Failures raised by the normalization callback and its statistics.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// Batch output is missing the mandatory `pred_scores` entry.
    #[error("malformed batch output: missing 'pred_scores'")]
    MissingScores,

    /// A batch entry could not be read as a float64 array.
    #[error("batch entry '{key}' is not a float64 numpy array")]
    ScoreDtype { key: &'static str },

    /// Normalization was requested before any statistics were collected.
    #[error("no min/max statistics collected, was the validation phase skipped?")]
    NoObservations,
}

impl From<NormalizationError> for PyErr {
    fn from(err: NormalizationError) -> PyErr {
        match err {
            NormalizationError::MissingScores => PyKeyError::new_err(err.to_string()),
            NormalizationError::ScoreDtype { .. } => PyTypeError::new_err(err.to_string()),
            NormalizationError::NoObservations => PyValueError::new_err(err.to_string()),
        }
    }
}
