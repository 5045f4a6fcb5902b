//! Error types for the prediction pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline.
///
/// Every stage validates its own inputs and returns the most specific
/// variant it can, naming the stage and the offending column or shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed or irreparably missing input data
    #[error("Data error: {0}")]
    DataError(String),

    /// Length or dimension mismatch between paired sequences
    #[error("Shape mismatch in {stage}: expected {expected}, got {actual}")]
    ShapeMismatch {
        stage: String,
        expected: String,
        actual: String,
    },

    /// Zero-variance column rejected by a strict scaler
    #[error("Degenerate column: '{column}' has zero variance")]
    DegenerateColumn { column: String },

    /// Bad dimensionality-reduction target
    #[error("Invalid dimension: requested {requested} components, {available} features available")]
    InvalidDimension { requested: usize, available: usize },

    /// Similarity query against an empty reference set
    #[error("Similarity index has no reference rows")]
    EmptyIndex,

    /// Parameter outside its valid domain
    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// Operation needs state that was never fitted
    #[error("Model not fitted: {0}")]
    ModelNotFitted(String),
}

impl PipelineError {
    pub(crate) fn shape(
        stage: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        PipelineError::ShapeMismatch {
            stage: stage.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn parameter(
        name: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeMismatch {
            stage: "ndarray".to_string(),
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_shape_error_names_stage() {
        let err = PipelineError::shape("evaluate", "3 predictions", "2 predictions");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in evaluate: expected 3 predictions, got 2 predictions"
        );
    }

    #[test]
    fn test_error_from_ndarray() {
        let err: PipelineError = ndarray::Array2::<f64>::from_shape_vec((2, 2), vec![1.0])
            .unwrap_err()
            .into();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }
}
