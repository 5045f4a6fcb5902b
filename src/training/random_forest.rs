//! Random forest regressor
//!
//! Bootstrap-aggregated regression trees. Every tree draws its bootstrap
//! sample and its per-split feature subsets from its own generator, seeded
//! with `random_state + tree_index`, so the fitted forest does not depend
//! on whether trees were built sequentially or on the rayon pool.

use super::decision_tree::RegressionTree;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl Default for MaxFeatures {
    fn default() -> Self {
        Self::All
    }
}

impl MaxFeatures {
    /// Resolve to a concrete feature count in `1..=n_features`
    pub fn resolve(&self, n_features: usize) -> usize {
        let m = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        m.clamp(1, n_features.max(1))
    }
}

/// Forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed; tree `i` uses `random_state + i`
    pub random_state: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: 42,
        }
    }
}

impl ForestConfig {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            ..Default::default()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Check hyper-parameter domains
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::parameter("n_estimators", 0, "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::parameter(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::parameter("min_samples_leaf", 0, "must be at least 1"));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(PipelineError::parameter(
                "max_features",
                f,
                "fraction must be in (0, 1]",
            )),
            MaxFeatures::Fixed(0) => Err(PipelineError::parameter("max_features", 0, "must be at least 1")),
            _ => Ok(()),
        }
    }
}

/// Fitted random forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Array1<f64>,
    oob_mse: Option<f64>,
}

impl RandomForest {
    /// Fit the forest to training data
    pub fn fit(config: &ForestConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        config.validate()?;

        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::shape(
                "random forest fit",
                format!("{} targets", n_samples),
                format!("{} targets", y.len()),
            ));
        }
        if n_samples == 0 {
            return Err(PipelineError::DataError(
                "random forest needs at least one training row".to_string(),
            ));
        }

        let n_features = x.ncols();
        let max_features = config.max_features.resolve(n_features);

        let fit_tree = |tree_idx: usize| -> Result<(RegressionTree, Vec<usize>)> {
            let seed = config.random_state.wrapping_add(tree_idx as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let sample_indices: Vec<usize> = if config.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = RegressionTree::new()
                .with_min_samples_split(config.min_samples_split)
                .with_min_samples_leaf(config.min_samples_leaf)
                .with_max_features(max_features)
                .with_random_state(seed);
            tree.max_depth = config.max_depth;

            tree.fit_rows(x, y, &sample_indices, &mut rng)?;
            Ok((tree, sample_indices))
        };

        #[cfg(feature = "parallel")]
        let fitted: Vec<(RegressionTree, Vec<usize>)> = (0..config.n_estimators)
            .into_par_iter()
            .map(fit_tree)
            .collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let fitted: Vec<(RegressionTree, Vec<usize>)> =
            (0..config.n_estimators).map(fit_tree).collect::<Result<_>>()?;

        let oob_mse = if config.bootstrap {
            out_of_bag_mse(&fitted, x, y)?
        } else {
            None
        };

        let trees: Vec<RegressionTree> = fitted.into_iter().map(|(tree, _)| tree).collect();
        let feature_importances = average_importances(&trees, n_features);

        debug!(
            n_trees = trees.len(),
            max_features,
            oob_mse = oob_mse.unwrap_or(f64::NAN),
            "Fitted random forest"
        );

        Ok(Self {
            config: config.clone(),
            trees,
            n_features,
            feature_importances,
            oob_mse,
        })
    }

    /// Mean of the tree predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::shape(
                "random forest predict",
                format!("{} features", self.n_features),
                format!("{} features", x.ncols()),
            ));
        }

        let mut sum = Array1::zeros(x.nrows());
        for tree in &self.trees {
            sum += &tree.predict(x)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &Array1<f64> {
        &self.feature_importances
    }

    /// Out-of-bag mean squared error, when bootstrap left rows out
    pub fn oob_mse(&self) -> Option<f64> {
        self.oob_mse
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

/// Score every training row with the trees that never saw it
fn out_of_bag_mse(
    fitted: &[(RegressionTree, Vec<usize>)],
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<Option<f64>> {
    let n_samples = x.nrows();
    let mut sums = vec![0.0; n_samples];
    let mut counts = vec![0usize; n_samples];

    for (tree, sampled) in fitted {
        let mut in_bag = vec![false; n_samples];
        for &i in sampled {
            in_bag[i] = true;
        }
        let predictions = tree.predict(x)?;
        for i in (0..n_samples).filter(|&i| !in_bag[i]) {
            sums[i] += predictions[i];
            counts[i] += 1;
        }
    }

    let (sq_err, scored) = (0..n_samples)
        .filter(|&i| counts[i] > 0)
        .fold((0.0, 0usize), |(acc, n), i| {
            let pred = sums[i] / counts[i] as f64;
            (acc + (y[i] - pred).powi(2), n + 1)
        });

    Ok((scored > 0).then(|| sq_err / scored as f64))
}

fn average_importances(trees: &[RegressionTree], n_features: usize) -> Array1<f64> {
    let mut total = Array1::zeros(n_features);
    for imp in trees.iter().filter_map(|t| t.feature_importances()) {
        total += imp;
    }

    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    total
}
