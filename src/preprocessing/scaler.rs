//! Feature standardization

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with a zero-variance column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegeneratePolicy {
    /// Subtract the mean but leave the column unscaled
    Center,
    /// Reject the column with [`PipelineError::DegenerateColumn`]
    Fail,
}

impl Default for DegeneratePolicy {
    fn default() -> Self {
        Self::Center
    }
}

/// Z-score scaler: (x - mean) / std, statistics taken from train rows only.
///
/// A column whose values are all equal cannot be divided by its standard
/// deviation. Under [`DegeneratePolicy::Center`] such a column is only
/// mean-subtracted, which is a deliberate deviation from pure z-scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    policy: DegeneratePolicy,
}

impl StandardScaler {
    /// Create a scaler with the centering fallback
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the degenerate-column policy
    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fit per-column statistics
    pub fn fit(&self, x: &Array2<f64>) -> Result<ScalerState> {
        let names: Vec<String> = (0..x.ncols()).map(|j| format!("column {}", j)).collect();
        self.fit_named(x, &names)
    }

    /// Fit per-column statistics, naming columns in warnings and errors
    pub fn fit_named(&self, x: &Array2<f64>, names: &[String]) -> Result<ScalerState> {
        if names.len() != x.ncols() {
            return Err(PipelineError::shape(
                "scaler fit",
                format!("{} column names", x.ncols()),
                format!("{} column names", names.len()),
            ));
        }

        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            PipelineError::DataError("scaler fit needs at least one row".to_string())
        })?;
        let stds = x.std_axis(Axis(0), 0.0);

        let mut scales = Array1::ones(x.ncols());
        let mut degenerate = Vec::new();

        for (j, col) in x.columns().into_iter().enumerate() {
            let min = col.iter().copied().fold(f64::INFINITY, f64::min);
            let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            if min == max {
                match self.policy {
                    DegeneratePolicy::Fail => {
                        return Err(PipelineError::DegenerateColumn {
                            column: names[j].clone(),
                        })
                    }
                    DegeneratePolicy::Center => {
                        warn!(column = %names[j], "Zero-variance column is centered but not scaled");
                        degenerate.push(j);
                    }
                }
            } else {
                scales[j] = stds[j];
            }
        }

        Ok(ScalerState {
            means,
            scales,
            degenerate,
        })
    }
}

/// Fitted standardization statistics.
///
/// Applying the state to new rows never refits it, so test rows are
/// always scaled with train statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    means: Array1<f64>,
    scales: Array1<f64>,
    degenerate: Vec<usize>,
}

impl ScalerState {
    /// Scale a row set
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let centered = x - &self.means.view().insert_axis(Axis(0));
        Ok(centered / &self.scales.view().insert_axis(Axis(0)))
    }

    /// Scale a single row
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((row - &self.means) / &self.scales)
    }

    /// Undo the scaling
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let unscaled = x * &self.scales.view().insert_axis(Axis(0));
        Ok(unscaled + &self.means.view().insert_axis(Axis(0)))
    }

    /// Train means per column
    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    /// Divisors per column (1.0 for degenerate columns)
    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }

    /// Indices of zero-variance columns that were only centered
    pub fn degenerate_columns(&self) -> &[usize] {
        &self.degenerate
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(PipelineError::shape(
                "scaler transform",
                format!("{} features", self.n_features()),
                format!("{} features", width),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let state = StandardScaler::new().fit(&x).unwrap();
        let scaled = state.transform(&x).unwrap();

        for col in scaled.columns() {
            let mean = col.mean().unwrap();
            let std = col.std(0.0);
            assert!(mean.abs() < 1e-10); // Mean should be ~0
            assert!((std - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_degenerate_column_centered() {
        let x = array![[1.0, 0.1], [2.0, 0.1], [3.0, 0.1]];
        let state = StandardScaler::new().fit(&x).unwrap();
        assert_eq!(state.degenerate_columns(), &[1]);
        assert_eq!(state.scales()[1], 1.0);

        let scaled = state.transform(&x).unwrap();
        for v in scaled.column(1) {
            assert!(v.abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_column_strict() {
        let x = array![[1.0, 5.0], [2.0, 5.0]];
        let names = vec!["price".to_string(), "weight".to_string()];
        let err = StandardScaler::new()
            .with_policy(DegeneratePolicy::Fail)
            .fit_named(&x, &names)
            .unwrap_err();
        assert_eq!(err, PipelineError::DegenerateColumn { column: "weight".to_string() });
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -3.0], [2.0, 0.5], [4.0, 8.0]];
        let state = StandardScaler::new().fit(&x).unwrap();
        let restored = state.inverse_transform(&state.transform(&x).unwrap()).unwrap();

        for (o, r) in x.iter().zip(restored.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_width_mismatch() {
        let state = StandardScaler::new().fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let err = state.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_fit() {
        let x = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            StandardScaler::new().fit(&x),
            Err(PipelineError::DataError(_))
        ));
    }
}
