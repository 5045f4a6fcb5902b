//! Prediction error metrics

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Error of a set of predictions against the true targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Mean Squared Error
    pub mse: f64,
    /// True target values
    pub actual: Array1<f64>,
    /// Predicted target values, aligned with `actual`
    pub predicted: Array1<f64>,
}

impl EvaluationResult {
    /// Root Mean Squared Error
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }

    /// Mean Absolute Error
    pub fn mae(&self) -> f64 {
        (&self.actual - &self.predicted).mapv(f64::abs).sum() / self.len() as f64
    }

    /// Coefficient of determination.
    /// A constant target has no variance to explain and scores 0.
    pub fn r2(&self) -> f64 {
        let y_mean = self.actual.sum() / self.len() as f64;
        let ss_tot: f64 = self.actual.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res = self.mse * self.len() as f64;

        if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        }
    }

    /// Number of evaluated rows
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

/// Compare predictions with true targets
pub fn evaluate(actual: &Array1<f64>, predicted: &Array1<f64>) -> Result<EvaluationResult> {
    if actual.len() != predicted.len() {
        return Err(PipelineError::shape(
            "evaluate",
            format!("{} predictions", actual.len()),
            format!("{} predictions", predicted.len()),
        ));
    }
    if actual.is_empty() {
        return Err(PipelineError::DataError(
            "cannot evaluate zero predictions".to_string(),
        ));
    }

    let mse = (actual - predicted).mapv(|e| e * e).sum() / actual.len() as f64;

    debug!(n_samples = actual.len(), mse, "Evaluated predictions");

    Ok(EvaluationResult {
        mse,
        actual: actual.clone(),
        predicted: predicted.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let result = evaluate(&y_true, &y_pred).unwrap();

        assert!((result.mse - 0.006).abs() < 1e-12);
        assert!((result.rmse() - 0.006f64.sqrt()).abs() < 1e-12);
        assert!((result.mae() - 0.06).abs() < 1e-12);
        assert!(result.r2() > 0.9);
    }

    #[test]
    fn test_perfect_predictions() {
        let y = array![3.0, -1.0, 7.5];
        let result = evaluate(&y, &y).unwrap();
        assert_eq!(result.mse, 0.0);
        assert_eq!(result.r2(), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = evaluate(&array![1.0, 2.0, 3.0], &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_input() {
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(evaluate(&empty, &empty), Err(PipelineError::DataError(_))));
    }
}
