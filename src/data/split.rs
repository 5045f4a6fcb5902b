//! Reproducible train/test partitioning

use super::FeatureTable;
use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A disjoint train/test partition of row indices.
///
/// Together the two index lists cover `0..n` exactly once. Both are kept
/// in ascending order so downstream ties resolve by original row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl Split {
    /// Total number of rows covered
    pub fn n_rows(&self) -> usize {
        self.train_indices.len() + self.test_indices.len()
    }

    /// Materialize the train and test tables
    pub fn apply(&self, table: &FeatureTable) -> Result<(FeatureTable, FeatureTable)> {
        if self.n_rows() != table.n_rows() {
            return Err(PipelineError::shape(
                "split",
                format!("{} rows", self.n_rows()),
                format!("{} rows", table.n_rows()),
            ));
        }
        Ok((table.subset(&self.train_indices)?, table.subset(&self.test_indices)?))
    }
}

/// Seeded shuffle splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Splitter {
    test_fraction: f64,
    random_state: u64,
}

impl Splitter {
    /// Create a splitter holding out `test_fraction` of the rows
    pub fn new(test_fraction: f64, random_state: u64) -> Self {
        Self {
            test_fraction,
            random_state,
        }
    }

    /// Split the rows of a table
    pub fn split(&self, table: &FeatureTable) -> Result<Split> {
        self.split_indices(table.n_rows())
    }

    /// Split `0..n_samples`.
    ///
    /// The first `round(test_fraction * n)` entries of a seeded permutation
    /// become the test set and the rest the train set.
    pub fn split_indices(&self, n_samples: usize) -> Result<Split> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::parameter(
                "test_fraction",
                self.test_fraction,
                "must be strictly between 0 and 1",
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        indices.shuffle(&mut rng);

        let n_test = ((self.test_fraction * n_samples as f64).round() as usize).min(n_samples);
        let mut test_indices = indices[..n_test].to_vec();
        let mut train_indices = indices[n_test..].to_vec();
        test_indices.sort_unstable();
        train_indices.sort_unstable();

        debug!(
            n_train = train_indices.len(),
            n_test = test_indices.len(),
            seed = self.random_state,
            "Split rows"
        );

        Ok(Split {
            train_indices,
            test_indices,
        })
    }
}
