//! Nearest-neighbor similarity index
//!
//! Brute-force Euclidean search over a fixed reference set, keeping the
//! k best candidates in a bounded max-heap.

use ndarray::{Array1, Array2, ArrayView1};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// One query hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Caller-supplied identifier of the reference row
    pub row_id: usize,
    /// Position of the row within the index
    pub position: usize,
    /// Euclidean distance to the query
    pub distance: f64,
}

/// Read-only nearest-neighbor structure over reference rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityIndex {
    reference: Array2<f64>,
    row_ids: Vec<usize>,
    targets: Option<Array1<f64>>,
}

impl SimilarityIndex {
    /// Index `reference` rows, identified by `row_ids`
    pub fn fit(reference: Array2<f64>, row_ids: Vec<usize>) -> Result<Self> {
        if reference.nrows() == 0 {
            return Err(PipelineError::EmptyIndex);
        }
        if row_ids.len() != reference.nrows() {
            return Err(PipelineError::shape(
                "similarity index",
                format!("{} row ids", reference.nrows()),
                format!("{} row ids", row_ids.len()),
            ));
        }

        debug!(
            n_reference = reference.nrows(),
            n_features = reference.ncols(),
            "Built similarity index"
        );

        Ok(Self {
            reference,
            row_ids,
            targets: None,
        })
    }

    /// Attach target values so the index can predict by neighbor mean
    pub fn with_targets(mut self, targets: Array1<f64>) -> Result<Self> {
        if targets.len() != self.len() {
            return Err(PipelineError::shape(
                "similarity index",
                format!("{} targets", self.len()),
                format!("{} targets", targets.len()),
            ));
        }
        self.targets = Some(targets);
        Ok(self)
    }

    /// The `min(k, len)` closest reference rows, nearest first.
    /// Equal distances keep the reference order.
    pub fn query(&self, vector: &ArrayView1<f64>, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(PipelineError::parameter("k", k, "must be at least 1"));
        }
        if vector.len() != self.n_features() {
            return Err(PipelineError::shape(
                "similarity query",
                format!("{} features", self.n_features()),
                format!("{} features", vector.len()),
            ));
        }

        Ok(self
            .nearest(vector, k)
            .into_iter()
            .map(|c| Neighbor {
                row_id: self.row_ids[c.position],
                position: c.position,
                distance: c.distance,
            })
            .collect())
    }

    /// Mean target of the k nearest reference rows, per input row
    pub fn predict(&self, rows: &Array2<f64>, k: usize) -> Result<Array1<f64>> {
        let targets = self.targets.as_ref().ok_or_else(|| {
            PipelineError::ModelNotFitted("similarity index has no targets".to_string())
        })?;
        if k == 0 {
            return Err(PipelineError::parameter("k", k, "must be at least 1"));
        }
        if rows.ncols() != self.n_features() {
            return Err(PipelineError::shape(
                "similarity predict",
                format!("{} features", self.n_features()),
                format!("{} features", rows.ncols()),
            ));
        }

        let neighbor_mean = |i: usize| {
            let hits = self.nearest(&rows.row(i), k);
            hits.iter().map(|c| targets[c.position]).sum::<f64>() / hits.len() as f64
        };

        #[cfg(feature = "parallel")]
        let predictions: Vec<f64> = (0..rows.nrows()).into_par_iter().map(neighbor_mean).collect();
        #[cfg(not(feature = "parallel"))]
        let predictions: Vec<f64> = (0..rows.nrows()).map(neighbor_mean).collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Identifiers of the reference rows, in index order
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn targets(&self) -> Option<&Array1<f64>> {
        self.targets.as_ref()
    }

    pub fn len(&self) -> usize {
        self.reference.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.nrows() == 0
    }

    pub fn n_features(&self) -> usize {
        self.reference.ncols()
    }

    /// Bounded max-heap scan: O(n log k)
    fn nearest(&self, point: &ArrayView1<f64>, k: usize) -> Vec<Candidate> {
        let mut heap = BinaryHeap::with_capacity(k + 1);

        for (position, row) in self.reference.rows().into_iter().enumerate() {
            let candidate = Candidate {
                distance: euclidean(point, &row),
                position,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
    }
}

/// Heap entry ordered by distance, then position
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    position: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.position.cmp(&other.position))
    }
}

fn euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(ai, bi)| {
            let d = ai - bi;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn index() -> SimilarityIndex {
        let reference = array![[0.0, 0.0], [1.0, 0.0], [0.0, 3.0], [5.0, 5.0], [1.0, 0.0]];
        SimilarityIndex::fit(reference, vec![10, 11, 12, 13, 14]).unwrap()
    }

    #[test]
    fn test_query_self_first() {
        let index = index();
        let hits = index.query(&array![5.0, 5.0].view(), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row_id, 13);
        assert!(hits[0].distance.abs() < 1e-12);
    }

    #[test]
    fn test_query_ordering_and_ties() {
        let index = index();
        let hits = index.query(&array![1.0, 0.0].view(), 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.row_id).collect();
        // Rows 1 and 4 are identical; the earlier one wins the tie
        assert_eq!(ids, vec![11, 14, 10]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_k_larger_than_index() {
        let hits = index().query(&array![0.0, 0.0].view(), 50).unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_euclidean_distance() {
        let reference = array![[3.0, 4.0]];
        let index = SimilarityIndex::fit(reference, vec![0]).unwrap();
        let hits = index.query(&array![0.0, 0.0].view(), 1).unwrap();
        assert!((hits[0].distance - 5.0).abs() < 0.001, "Euclidean distance should be 5.0");
    }

    #[test]
    fn test_invalid_queries() {
        let index = index();
        assert!(matches!(
            index.query(&array![0.0, 0.0].view(), 0),
            Err(PipelineError::InvalidParameter { .. })
        ));
        assert!(matches!(
            index.query(&array![0.0].view(), 1),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_index() {
        let err = SimilarityIndex::fit(Array2::zeros((0, 3)), vec![]).unwrap_err();
        assert_eq!(err, PipelineError::EmptyIndex);
    }

    #[test]
    fn test_neighbor_mean_prediction() {
        let reference = array![[0.0], [1.0], [2.0], [10.0]];
        let index = SimilarityIndex::fit(reference, vec![0, 1, 2, 3])
            .unwrap()
            .with_targets(array![1.0, 2.0, 3.0, 100.0])
            .unwrap();

        let preds = index.predict(&array![[0.9], [9.0]], 2).unwrap();
        assert!((preds[0] - 1.5).abs() < 1e-12);
        assert!((preds[1] - 51.5).abs() < 1e-12);
    }

    #[test]
    fn test_predict_without_targets() {
        let err = index().predict(&array![[0.0, 0.0]], 1).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted(_)));
    }
}
