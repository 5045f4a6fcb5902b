//! Model fitting
//!
//! Provides the two model families the pipeline can fit:
//! - Nearest-neighbor similarity retrieval
//! - Supervised regression (random forest or linear least squares)

pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod predictor;
pub mod random_forest;

pub use decision_tree::{RegressionTree, TreeNode};
pub use knn::{Neighbor, SimilarityIndex};
pub use linear_models::{LinearConfig, LinearRegression};
pub use predictor::{RegressionModel, RegressionStrategy, Regressor, ScorePredictor};
pub use random_forest::{ForestConfig, MaxFeatures, RandomForest};
