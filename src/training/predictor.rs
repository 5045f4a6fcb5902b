//! Supervised score prediction

use super::linear_models::{LinearConfig, LinearRegression};
use super::random_forest::{ForestConfig, RandomForest};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Shared interface of fitted regression models
pub trait Regressor: Send + Sync {
    /// Predict one target value per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Input width the model was fitted on
    fn n_features(&self) -> usize;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

impl Regressor for RandomForest {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn n_features(&self) -> usize {
        RandomForest::n_features(self)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        Some(RandomForest::feature_importances(self).clone())
    }
}

impl Regressor for LinearRegression {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }

    fn n_features(&self) -> usize {
        LinearRegression::n_features(self)
    }

    /// Absolute coefficients, normalized to sum to one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let abs = self.coefficients().mapv(f64::abs);
        let total = abs.sum();
        Some(if total > 0.0 { abs / total } else { abs })
    }
}

/// Which estimator to fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegressionStrategy {
    /// Bootstrap-aggregated regression trees
    RandomForest(ForestConfig),
    /// Least squares with intercept
    Linear(LinearConfig),
}

impl Default for RegressionStrategy {
    fn default() -> Self {
        Self::RandomForest(ForestConfig::default())
    }
}

/// Fitted regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionModel {
    RandomForest(RandomForest),
    Linear(LinearRegression),
}

impl RegressionModel {
    /// Short model name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            RegressionModel::RandomForest(_) => "random_forest",
            RegressionModel::Linear(_) => "linear",
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            RegressionModel::RandomForest(m) => m,
            RegressionModel::Linear(m) => m,
        }
    }
}

impl Regressor for RegressionModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }
}

/// Fits a [`RegressionModel`] for the configured strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorePredictor {
    strategy: RegressionStrategy,
}

impl ScorePredictor {
    pub fn new(strategy: RegressionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &RegressionStrategy {
        &self.strategy
    }

    /// Fit on feature rows and their targets
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<RegressionModel> {
        if x.nrows() != y.len() {
            return Err(PipelineError::shape(
                "score predictor fit",
                format!("{} targets", x.nrows()),
                format!("{} targets", y.len()),
            ));
        }
        if x.nrows() == 0 {
            return Err(PipelineError::DataError(
                "score predictor needs at least one training row".to_string(),
            ));
        }

        let start = Instant::now();
        let model = match &self.strategy {
            RegressionStrategy::RandomForest(config) => {
                RegressionModel::RandomForest(RandomForest::fit(config, x, y)?)
            }
            RegressionStrategy::Linear(config) => {
                RegressionModel::Linear(LinearRegression::fit(config, x, y)?)
            }
        };

        info!(
            model = model.name(),
            n_samples = x.nrows(),
            n_features = x.ncols(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Fitted score predictor"
        );

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0, 0.5], [2.0, 1.5], [3.0, 0.0], [4.0, 2.0], [5.0, 1.0], [6.0, 0.5]];
        let y = x.column(0).mapv(|v| 10.0 * v);
        (x, y)
    }

    #[test]
    fn test_linear_strategy_exact() {
        let (x, y) = data();
        let model = ScorePredictor::new(RegressionStrategy::Linear(LinearConfig::default()))
            .fit(&x, &y)
            .unwrap();
        let preds = model.predict(&x).unwrap();
        for (p, a) in preds.iter().zip(y.iter()) {
            assert!((p - a).abs() < 1e-8);
        }
        assert_eq!(model.name(), "linear");
    }

    #[test]
    fn test_forest_strategy() {
        let (x, y) = data();
        let model = ScorePredictor::new(RegressionStrategy::RandomForest(ForestConfig::new(20)))
            .fit(&x, &y)
            .unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 6);
        // Tree predictions never leave the training target range
        assert!(preds.iter().all(|&p| (10.0..=60.0).contains(&p)));

        let importances = model.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_errors() {
        let predictor = ScorePredictor::default();
        assert!(matches!(
            predictor.fit(&array![[1.0], [2.0]], &array![1.0]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            predictor.fit(&Array2::zeros((0, 2)), &Array1::zeros(0)),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_predict_width_mismatch() {
        let (x, y) = data();
        let model = ScorePredictor::new(RegressionStrategy::Linear(LinearConfig::default()))
            .fit(&x, &y)
            .unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0, 3.0]]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }
}
