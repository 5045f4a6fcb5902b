//! End-to-end prediction pipeline
//!
//! `FeatureTable -> Splitter -> Scaler -> (PCA) -> {SimilarityIndex | ScorePredictor}`
//!
//! [`Pipeline::fit`] runs every stage on the train rows once and returns a
//! read-only [`FittedPipeline`] that transforms, predicts, evaluates and
//! ranks without refitting anything.

mod config;

pub use config::{ModelStrategy, PipelineConfig};

use crate::data::{FeatureTable, Split, Splitter};
use crate::error::{PipelineError, Result};
use crate::evaluation::{evaluate, EvaluationResult};
use crate::preprocessing::{Pca, ReducerState, ScalerState, StandardScaler};
use crate::recommend::{Recommendation, Recommender};
use crate::training::{RegressionModel, Regressor, ScorePredictor, SimilarityIndex};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Model produced by the configured [`ModelStrategy`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Similarity(SimilarityIndex),
    Regression(RegressionModel),
}

impl FittedModel {
    pub fn name(&self) -> &'static str {
        match self {
            FittedModel::Similarity(_) => "similarity",
            FittedModel::Regression(model) => model.name(),
        }
    }
}

/// Unfitted pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split the table and fit every stage on the train rows
    pub fn fit(&self, table: &FeatureTable) -> Result<FittedPipeline> {
        self.config.validate()?;
        let start = Instant::now();

        let split = Splitter::new(self.config.test_fraction, self.config.random_seed).split(table)?;
        let train = table.subset(&split.train_indices)?;

        let scaler = StandardScaler::new()
            .with_policy(self.config.degenerate_policy)
            .fit_named(train.features(), train.feature_names())?;
        let scaled = scaler.transform(train.features())?;

        let reducer = match self.config.reduced_dimensions {
            Some(k) => Some(
                Pca::new(k)
                    .with_random_state(self.config.random_seed)
                    .fit(&scaled)?,
            ),
            None => None,
        };
        let projected = match &reducer {
            Some(r) => r.transform(&scaled)?,
            None => scaled,
        };

        let model = match self.config.regression_strategy() {
            None => FittedModel::Similarity(
                SimilarityIndex::fit(projected, split.train_indices.clone())?
                    .with_targets(train.target().clone())?,
            ),
            Some(strategy) => {
                FittedModel::Regression(ScorePredictor::new(strategy).fit(&projected, train.target())?)
            }
        };

        let fit_time_secs = start.elapsed().as_secs_f64();

        info!(
            model = model.name(),
            n_train = split.train_indices.len(),
            n_test = split.test_indices.len(),
            n_features = table.n_features(),
            reduced = ?self.config.reduced_dimensions,
            fit_time_secs,
            "Fitted pipeline"
        );

        Ok(FittedPipeline {
            config: self.config.clone(),
            split,
            feature_names: table.feature_names().to_vec(),
            fingerprint: TableFingerprint::of(table),
            labels: table.labels().map(<[String]>::to_vec),
            scaler,
            reducer,
            model,
            fit_time_secs,
        })
    }
}

/// Read-only result of [`Pipeline::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    config: PipelineConfig,
    split: Split,
    feature_names: Vec<String>,
    fingerprint: TableFingerprint,
    labels: Option<Vec<String>>,
    scaler: ScalerState,
    reducer: Option<ReducerState>,
    model: FittedModel,
    fit_time_secs: f64,
}

impl FittedPipeline {
    /// Scale and (optionally) project encoded feature rows
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let scaled = self.scaler.transform(features)?;
        match &self.reducer {
            Some(r) => r.transform(&scaled),
            None => Ok(scaled),
        }
    }

    /// Scale and (optionally) project a single encoded row
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform_row(row)?;
        match &self.reducer {
            Some(r) => r.transform_row(&scaled.view()),
            None => Ok(scaled),
        }
    }

    /// Predict targets for encoded feature rows
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let x = self.transform(features)?;
        self.as_regressor().predict(&x)
    }

    /// Error on the held-out rows of the table the pipeline was fitted on.
    /// Any other table is rejected: a different row count is a
    /// `ShapeMismatch`, different contents a `DataError`.
    pub fn evaluate(&self, table: &FeatureTable) -> Result<EvaluationResult> {
        let (_, test) = self.split.apply(table)?;
        if table.feature_names() != self.feature_names.as_slice()
            || TableFingerprint::of(table) != self.fingerprint
        {
            return Err(PipelineError::DataError(
                "table differs from the one the pipeline was fitted on".to_string(),
            ));
        }
        if test.n_rows() == 0 {
            return Err(PipelineError::DataError(
                "test partition is empty; raise test_fraction or add rows".to_string(),
            ));
        }

        let predictions = self.predict(test.features())?;
        let result = evaluate(test.target(), &predictions)?;

        info!(
            model = self.model.name(),
            n_test = result.len(),
            mse = result.mse,
            "Evaluated pipeline"
        );
        Ok(result)
    }

    /// Train rows most similar to an encoded query row.
    /// Row ids refer to the fitted table.
    pub fn recommend_similar(&self, query: &ArrayView1<f64>, k: usize) -> Result<Recommendation> {
        let index = match &self.model {
            FittedModel::Similarity(index) => index,
            FittedModel::Regression(model) => {
                return Err(PipelineError::ModelNotFitted(format!(
                    "similarity index (pipeline fitted with {})",
                    model.name()
                )))
            }
        };

        let q = self.transform_row(query)?;
        Ok(Recommender::by_similarity(index, &q.view(), k)?.with_labels(|row| self.label(row)))
    }

    /// Encoded candidate rows ranked by predicted score.
    /// Row ids are candidate positions.
    pub fn recommend_by_score(&self, candidates: &Array2<f64>) -> Result<Recommendation> {
        if candidates.nrows() == 0 {
            return Ok(Recommendation::default());
        }
        let x = self.transform(candidates)?;
        Recommender::by_score(&self.as_regressor(), &x)
    }

    /// Rows of the fitted table ranked by predicted score, labelled
    pub fn rank_table(&self, table: &FeatureTable, rows: &[usize]) -> Result<Recommendation> {
        let subset = table.subset(rows)?;
        Ok(self
            .recommend_by_score(subset.features())?
            .map_row_ids(|pos| rows[pos])
            .with_labels(|row| table.item_label(row).map(str::to_string)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    pub fn reducer(&self) -> Option<&ReducerState> {
        self.reducer.as_ref()
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Encoded feature names the pipeline expects
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Seconds spent in [`Pipeline::fit`]
    pub fn fit_time_secs(&self) -> f64 {
        self.fit_time_secs
    }

    fn label(&self, row: usize) -> Option<String> {
        self.labels.as_ref().and_then(|l| l.get(row)).cloned()
    }

    fn as_regressor(&self) -> ModelRegressor<'_> {
        ModelRegressor {
            model: &self.model,
            k: self.config.num_neighbors,
        }
    }
}

/// Row count plus an order-sensitive FNV-1a checksum over the feature
/// and target bits of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct TableFingerprint {
    n_rows: usize,
    checksum: u64,
}

impl TableFingerprint {
    fn of(table: &FeatureTable) -> Self {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let checksum = table
            .features()
            .iter()
            .chain(table.target().iter())
            .fold(OFFSET, |hash, v| (hash ^ v.to_bits()).wrapping_mul(PRIME));

        Self {
            n_rows: table.n_rows(),
            checksum,
        }
    }
}

/// Presents either model family as a [`Regressor`] over transformed rows
struct ModelRegressor<'a> {
    model: &'a FittedModel,
    k: usize,
}

impl Regressor for ModelRegressor<'_> {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self.model {
            FittedModel::Similarity(index) => index.predict(x, self.k),
            FittedModel::Regression(model) => model.predict(x),
        }
    }

    fn n_features(&self) -> usize {
        match self.model {
            FittedModel::Similarity(index) => index.n_features(),
            FittedModel::Regression(model) => model.n_features(),
        }
    }
}
