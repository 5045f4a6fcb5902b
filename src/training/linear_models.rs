//! Ordinary least squares regression

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative pivot tolerance for the normal-equation solve
const RANK_TOLERANCE: f64 = 1e-10;

/// Solve (X^T X) w = X^T y by Gauss-Jordan elimination with partial pivoting.
///
/// Columns without a usable pivot are linearly dependent on earlier ones.
/// They are treated as free variables and get weight 0, so collinear
/// features yield a minimum-support solution instead of an error.
/// Returns the solution and the numerical rank.
fn solve_normal_equations(xtx: &Array2<f64>, xty: &Array1<f64>) -> (Array1<f64>, usize) {
    let n = xtx.nrows();
    let mut a = xtx.clone();
    let mut b = xty.clone();

    let scale = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = RANK_TOLERANCE * scale.max(1.0);

    let mut pivot_cols = Vec::with_capacity(n);
    let mut row = 0;

    for col in 0..n {
        if row == n {
            break;
        }

        // Find pivot
        let mut max_row = row;
        for r in row + 1..n {
            if a[[r, col]].abs() > a[[max_row, col]].abs() {
                max_row = r;
            }
        }
        if a[[max_row, col]].abs() <= tol {
            continue;
        }

        // Swap rows
        if max_row != row {
            for j in 0..n {
                a.swap([row, j], [max_row, j]);
            }
            b.swap(row, max_row);
        }

        // Scale pivot row
        let pivot = a[[row, col]];
        for j in 0..n {
            a[[row, j]] /= pivot;
        }
        b[row] /= pivot;

        // Eliminate column
        for r in 0..n {
            if r != row {
                let factor = a[[r, col]];
                if factor != 0.0 {
                    for j in 0..n {
                        a[[r, j]] -= factor * a[[row, j]];
                    }
                    b[r] -= factor * b[row];
                }
            }
        }

        pivot_cols.push(col);
        row += 1;
    }

    let mut w = Array1::zeros(n);
    for (r, &col) in pivot_cols.iter().enumerate() {
        w[col] = b[r];
    }
    (w, pivot_cols.len())
}

/// Linear regression options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2); 0 is plain least squares
    pub alpha: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            alpha: 0.0,
        }
    }
}

impl LinearConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set regularization strength (Ridge regression)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(PipelineError::parameter(
                "alpha",
                self.alpha,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Fitted linear model: `y = x . coefficients + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Array1<f64>,
    intercept: f64,
    rank: usize,
}

impl LinearRegression {
    /// Fit the model to training data
    pub fn fit(config: &LinearConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::shape(
                "linear regression fit",
                format!("{} targets", n_samples),
                format!("{} targets", y.len()),
            ));
        }
        if n_samples == 0 {
            return Err(PipelineError::DataError(
                "linear regression needs at least one training row".to_string(),
            ));
        }

        // Center data if fitting intercept
        let (x_centered, y_centered, x_mean, y_mean) = if config.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
            let y_mean = y.mean().unwrap_or(0.0);

            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            (x_centered, y_centered, x_mean, y_mean)
        } else {
            (x.clone(), y.clone(), Array1::zeros(n_features), 0.0)
        };

        // Solve normal equations: (X^T X + alpha*I) * w = X^T y
        let mut xtx = x_centered.t().dot(&x_centered);
        if config.alpha > 0.0 {
            for i in 0..n_features {
                xtx[[i, i]] += config.alpha;
            }
        }
        let xty = x_centered.t().dot(&y_centered);
        let (coefficients, rank) = solve_normal_equations(&xtx, &xty);

        let intercept = y_mean - coefficients.dot(&x_mean);

        debug!(n_features, rank, intercept, "Fitted linear regression");

        Ok(Self {
            coefficients,
            intercept,
            rank,
        })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PipelineError::shape(
                "linear regression predict",
                format!("{} features", self.coefficients.len()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Fitted coefficients (weights)
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Fitted intercept (bias)
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of linearly independent features found while solving
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0], [3.0, 1.0]];
        // y = 2*x1 + 3*x2 + 1
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let model = LinearRegression::fit(&LinearConfig::new(), &x, &y).unwrap();

        assert!((model.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients()[1] - 3.0).abs() < 1e-9);
        assert!((model.intercept() - 1.0).abs() < 1e-9);
        assert_eq!(model.rank(), 2);
    }

    #[test]
    fn test_collinear_features() {
        // Second column is twice the first
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![10.0, 20.0, 30.0, 40.0];

        let model = LinearRegression::fit(&LinearConfig::new(), &x, &y).unwrap();
        assert_eq!(model.rank(), 1);
        assert_eq!(model.coefficients()[1], 0.0);

        let preds = model.predict(&array![[5.0, 10.0]]).unwrap();
        assert!((preds[0] - 50.0).abs() < 1e-9, "got {}", preds[0]);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let ols = LinearRegression::fit(&LinearConfig::new(), &x, &y).unwrap();
        let ridge = LinearRegression::fit(&LinearConfig::new().with_alpha(10.0), &x, &y).unwrap();
        assert!(ridge.coefficients()[0].abs() < ols.coefficients()[0].abs());
    }

    #[test]
    fn test_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![3.0, 6.0, 9.0];

        let model =
            LinearRegression::fit(&LinearConfig::new().with_fit_intercept(false), &x, &y).unwrap();
        assert_eq!(model.intercept(), 0.0);
        assert!((model.coefficients()[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_row() {
        let model = LinearRegression::fit(&LinearConfig::new(), &array![[3.0, 1.0]], &array![7.0]).unwrap();
        let preds = model.predict(&array![[0.0, 0.0], [9.0, 9.0]]).unwrap();
        assert_eq!(preds.to_vec(), vec![7.0, 7.0]);
    }

    #[test]
    fn test_errors() {
        let x = array![[1.0], [2.0]];
        assert!(matches!(
            LinearRegression::fit(&LinearConfig::new(), &x, &array![1.0]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            LinearRegression::fit(&LinearConfig::new().with_alpha(-1.0), &x, &array![1.0, 2.0]),
            Err(PipelineError::InvalidParameter { .. })
        ));

        let model = LinearRegression::fit(&LinearConfig::new(), &x, &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0]]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }
}
