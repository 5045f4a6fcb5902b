//! Feature preprocessing
//!
//! Stages fitted on train rows and applied to any row set:
//! - Standardization (z-score with a degenerate-column fallback)
//! - Optional PCA projection

mod reduction;
mod scaler;

pub use reduction::{Pca, ReducerState};
pub use scaler::{DegeneratePolicy, ScalerState, StandardScaler};
