//! tabpredict - Tabular prediction pipeline
//!
//! This crate fits one pipeline over a table of items and uses it for two
//! jobs: recommending items (by feature similarity or by predicted score)
//! and forecasting demand for inventory planning.
//!
//! # Modules
//!
//! - [`data`] - Raw rows, forward fill, one-hot encoding, train/test split
//! - [`preprocessing`] - Standardization and optional PCA
//! - [`training`] - Nearest-neighbor index, random forest, linear regression
//! - [`evaluation`] - Prediction error metrics
//! - [`recommend`] - Ranking by similarity or predicted score
//! - [`pipeline`] - End-to-end orchestration
//! - [`planning`] - Stock balance assessment and order allocation
//!
//! # Example
//!
//! ```
//! use tabpredict::prelude::*;
//!
//! let rows: Vec<RawRow> = (0..10)
//!     .map(|i| RawRow::new().with("x", i as f64).with("target", 10.0 * i as f64))
//!     .collect();
//! let table = FeatureTable::load(&rows, &TableConfig::new("target")).unwrap();
//!
//! let fitted = Pipeline::new(
//!     PipelineConfig::new().with_model_strategy(ModelStrategy::LinearRegression),
//! )
//! .fit(&table)
//! .unwrap();
//!
//! let result = fitted.evaluate(&table).unwrap();
//! assert!(result.mse < 1e-9);
//! ```

// Core error handling
pub mod error;

// Pipeline stages
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod evaluation;
pub mod recommend;

// Orchestration
pub mod pipeline;
pub mod planning;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Data
    pub use crate::data::{FeatureTable, RawRow, Split, Splitter, TableConfig, Value};

    // Preprocessing
    pub use crate::preprocessing::{DegeneratePolicy, Pca, ReducerState, ScalerState, StandardScaler};

    // Training
    pub use crate::training::{
        ForestConfig, LinearConfig, MaxFeatures, Neighbor, RegressionModel, RegressionStrategy,
        Regressor, ScorePredictor, SimilarityIndex,
    };

    // Evaluation and ranking
    pub use crate::evaluation::{evaluate, EvaluationResult};
    pub use crate::recommend::{Recommendation, RecommendedItem, Recommender};

    // Pipeline
    pub use crate::pipeline::{FittedModel, FittedPipeline, ModelStrategy, Pipeline, PipelineConfig};

    // Planning
    pub use crate::planning::{
        allocate_order, assess, OrderLine, PlanningReport, StockLine, StockPolicy, StockStatus,
    };
}
