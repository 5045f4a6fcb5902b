//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::preprocessing::DegeneratePolicy;
use crate::training::{ForestConfig, LinearConfig, RegressionStrategy};
use serde::{Deserialize, Serialize};

/// Model family fitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStrategy {
    /// Nearest-neighbor retrieval; predictions are neighbor-mean targets
    Similarity,
    /// Random forest regression
    EnsembleRegression,
    /// Least squares regression
    LinearRegression,
}

impl Default for ModelStrategy {
    fn default() -> Self {
        Self::EnsembleRegression
    }
}

/// Configuration for [`Pipeline`](super::Pipeline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of rows held out for evaluation, in (0, 1)
    pub test_fraction: f64,

    /// Seed for the split, PCA initialization and forest fitting
    pub random_seed: u64,

    /// PCA output dimensions (None = no reduction)
    pub reduced_dimensions: Option<usize>,

    /// Neighbors used by similarity prediction
    pub num_neighbors: usize,

    /// Model family
    pub model_strategy: ModelStrategy,

    /// Forest hyper-parameters. `forest.random_state` is replaced by
    /// `random_seed` when the pipeline fits.
    pub forest: ForestConfig,

    /// Linear model options
    pub linear: LinearConfig,

    /// Handling of zero-variance feature columns
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            random_seed: 42,
            reduced_dimensions: None,
            num_neighbors: 5,
            model_strategy: ModelStrategy::EnsembleRegression,
            forest: ForestConfig::default(),
            linear: LinearConfig::default(),
            degenerate_policy: DegeneratePolicy::Center,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Builder method to enable PCA
    pub fn with_reduced_dimensions(mut self, dimensions: usize) -> Self {
        self.reduced_dimensions = Some(dimensions);
        self
    }

    /// Builder method to set the neighbor count
    pub fn with_num_neighbors(mut self, k: usize) -> Self {
        self.num_neighbors = k;
        self
    }

    /// Builder method to set the model family
    pub fn with_model_strategy(mut self, strategy: ModelStrategy) -> Self {
        self.model_strategy = strategy;
        self
    }

    /// Builder method to set forest hyper-parameters
    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Builder method to set linear model options
    pub fn with_linear(mut self, linear: LinearConfig) -> Self {
        self.linear = linear;
        self
    }

    /// Builder method to set the degenerate-column policy
    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Check every field that can be checked without data.
    /// `reduced_dimensions` against the feature count is checked at fit.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::parameter(
                "test_fraction",
                self.test_fraction,
                "must be strictly between 0 and 1",
            ));
        }
        if self.num_neighbors == 0 {
            return Err(PipelineError::parameter("num_neighbors", 0, "must be at least 1"));
        }
        if self.reduced_dimensions == Some(0) {
            return Err(PipelineError::parameter(
                "reduced_dimensions",
                0,
                "must be a positive number of components",
            ));
        }
        match self.model_strategy {
            ModelStrategy::EnsembleRegression => self.forest.validate(),
            ModelStrategy::LinearRegression => self.linear.validate(),
            ModelStrategy::Similarity => Ok(()),
        }
    }

    /// Estimator for the regression families, seeded from `random_seed`
    pub fn regression_strategy(&self) -> Option<RegressionStrategy> {
        match self.model_strategy {
            ModelStrategy::Similarity => None,
            ModelStrategy::EnsembleRegression => Some(RegressionStrategy::RandomForest(ForestConfig {
                random_state: self.random_seed,
                ..self.forest.clone()
            })),
            ModelStrategy::LinearRegression => Some(RegressionStrategy::Linear(self.linear.clone())),
        }
    }
}
