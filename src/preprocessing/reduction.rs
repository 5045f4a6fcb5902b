//! PCA — Principal Component Analysis
//!
//! Linear dimensionality reduction fitted on scaled train rows.
//! Computes the top-k eigenvectors of the covariance matrix
//! using power iteration with deflation.
//!
//! The sign of each component is arbitrary: an equivalent fit may return
//! a component negated. Components are flipped so that their
//! largest-magnitude loading is positive, but callers should not rely on
//! sign stability.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MAX_ITER: usize = 1000;
const TOLERANCE: f64 = 1e-12;

/// PCA configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    /// Number of output dimensions
    pub n_components: usize,
    /// Random seed for power iteration initialization
    pub random_state: u64,
}

impl Pca {
    /// Create a PCA reducing to `n_components` dimensions
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            random_state: 42,
        }
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the projection on (scaled) train rows
    pub fn fit(&self, x: &Array2<f64>) -> Result<ReducerState> {
        let (n, d) = x.dim();

        if self.n_components == 0 || self.n_components > d {
            return Err(PipelineError::InvalidDimension {
                requested: self.n_components,
                available: d,
            });
        }
        if n < 2 {
            return Err(PipelineError::DataError(format!(
                "PCA requires at least 2 samples, got {}",
                n
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::DataError("PCA fit on empty rows".to_string()))?;
        let centered = x - &mean.view().insert_axis(Axis(0));

        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance: f64 = cov.diag().sum();

        let (eigenvalues, components) = self.power_iteration(&cov);

        let explained_variance_ratio = if total_variance > 0.0 {
            eigenvalues.mapv(|ev| ev / total_variance)
        } else {
            Array1::zeros(self.n_components)
        };

        debug!(
            n_components = self.n_components,
            explained = explained_variance_ratio.sum(),
            "Fitted PCA"
        );

        Ok(ReducerState {
            mean,
            components,
            explained_variance: eigenvalues,
            explained_variance_ratio,
        })
    }

    /// Power iteration with deflation to extract the top-k eigenvectors.
    ///
    /// Each iterate is re-orthogonalized against the components already
    /// found, so the basis stays orthonormal even when the remaining
    /// spectrum is flat or zero.
    fn power_iteration(&self, cov: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
        let d = cov.nrows();
        let k = self.n_components;

        let mut eigenvalues = Array1::zeros(k);
        let mut components = Array2::zeros((k, d));

        // Work on a copy so we can deflate
        let mut work = cov.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        for c in 0..k {
            // Initialize random unit vector
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            orthogonalize(&mut v, &components, c);
            if !normalize(&mut v) {
                v = fallback_direction(&components, c, d);
            }

            let mut eigenvalue = 0.0f64;

            for _ in 0..MAX_ITER {
                let mut w = work.dot(&v);
                orthogonalize(&mut w, &components, c);

                let new_eigenvalue = v.dot(&w);
                if !normalize(&mut w) {
                    // v lies in the null space of what remains
                    eigenvalue = 0.0;
                    break;
                }

                let diff = (&w - &v).mapv(|x| x * x).sum().sqrt();
                v = w;
                eigenvalue = new_eigenvalue;

                if diff < TOLERANCE {
                    break;
                }
            }

            flip_sign(&mut v);
            let eigenvalue = eigenvalue.max(0.0);
            eigenvalues[c] = eigenvalue;
            components.row_mut(c).assign(&v);

            // Deflate: A = A - eigenvalue * v * v^T
            let outer = v
                .view()
                .insert_axis(Axis(1))
                .dot(&v.view().insert_axis(Axis(0)));
            work = work - outer * eigenvalue;
        }

        (eigenvalues, components)
    }
}

/// Fitted PCA projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerState {
    mean: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl ReducerState {
    /// Project rows onto the components; always `n_components` wide
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let centered = x - &self.mean.view().insert_axis(Axis(0));
        Ok(centered.dot(&self.components.t()))
    }

    /// Project a single row
    pub fn transform_row(&self, row: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(self.components.dot(&(row - &self.mean)))
    }

    /// Orthonormal basis, one component per row
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Variance captured by each component, descending
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Fraction of total variance captured by each component
    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Input width the projection expects
    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(PipelineError::shape(
                "reducer transform",
                format!("{} features", self.n_features()),
                format!("{} features", width),
            ));
        }
        Ok(())
    }
}

/// Remove the projections onto the first `count` components
fn orthogonalize(v: &mut Array1<f64>, components: &Array2<f64>, count: usize) {
    for row in components.rows().into_iter().take(count) {
        let proj = row.dot(v);
        v.scaled_add(-proj, &row);
    }
}

/// Scale to unit length; false if the vector is numerically zero
fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm < 1e-12 {
        return false;
    }
    v.mapv_inplace(|x| x / norm);
    true
}

/// First standard basis vector not spanned by the found components
fn fallback_direction(components: &Array2<f64>, count: usize, d: usize) -> Array1<f64> {
    for axis in 0..d {
        let mut v = Array1::zeros(d);
        v[axis] = 1.0;
        orthogonalize(&mut v, components, count);
        if normalize(&mut v) {
            return v;
        }
    }
    Array1::zeros(d)
}

fn flip_sign(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![
            [1.0, 0.0, 0.5],
            [0.0, 1.0, 0.3],
            [1.0, 1.0, 0.8],
            [0.5, 0.5, 0.4],
            [0.2, 0.8, 0.6],
            [0.9, 0.1, 0.2],
        ]
    }

    #[test]
    fn test_pca_linear_data() {
        // Simple 2D data with clear primary axis
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let state = Pca::new(1).fit(&x).unwrap();

        assert!(
            state.explained_variance_ratio()[0] > 0.99,
            "First component should explain nearly all variance, got {}",
            state.explained_variance_ratio()[0]
        );
    }

    #[test]
    fn test_output_width() {
        let state = Pca::new(2).fit(&sample()).unwrap();
        assert_eq!(state.transform(&sample()).unwrap().dim(), (6, 2));
        assert_eq!(state.transform(&array![[0.3, 0.3, 0.3]]).unwrap().dim(), (1, 2));
        assert_eq!(state.transform(&Array2::zeros((0, 3))).unwrap().dim(), (0, 2));
    }

    #[test]
    fn test_components_orthonormal_and_ranked() {
        let state = Pca::new(3).fit(&sample()).unwrap();
        let gram = state.components().dot(&state.components().t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-6, "gram[{},{}] = {}", i, j, gram[[i, j]]);
            }
        }

        let ev = state.explained_variance();
        assert!(ev[0] >= ev[1] - 1e-9 && ev[1] >= ev[2] - 1e-9);
        let total: f64 = state.explained_variance_ratio().sum();
        assert!((total - 1.0).abs() < 1e-6, "sum={}", total);
    }

    #[test]
    fn test_rank_deficient_input() {
        // Third column is a copy of the first
        let x = array![[1.0, 2.0, 1.0], [2.0, 1.0, 2.0], [3.0, 5.0, 3.0], [4.0, 3.0, 4.0]];
        let state = Pca::new(3).fit(&x).unwrap();
        let gram = state.components().dot(&state.components().t());
        assert!((gram[[2, 2]] - 1.0).abs() < 1e-6);
        assert!(state.explained_variance()[2].abs() < 1e-6);
    }

    #[test]
    fn test_invalid_dimensions() {
        for k in [0, 4] {
            let err = Pca::new(k).fit(&sample()).unwrap_err();
            assert_eq!(err, PipelineError::InvalidDimension { requested: k, available: 3 });
        }
    }

    #[test]
    fn test_too_few_samples() {
        assert!(Pca::new(1).fit(&array![[1.0, 2.0]]).is_err());
    }
}
