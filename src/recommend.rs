//! Ranking of candidate items
//!
//! Two ways to rank:
//! - by similarity to a query vector (score = negative Euclidean distance)
//! - by a regression model's predicted score
//!
//! Both produce a [`Recommendation`] sorted by descending score with ties
//! kept in input order.

use crate::error::Result;
use crate::training::{Regressor, SimilarityIndex};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// One ranked item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    /// Row identifier in the source table (or candidate position)
    pub row_id: usize,
    /// Ranking score, higher is better
    pub score: f64,
    /// Item label, when the source table has an id column
    pub label: Option<String>,
}

/// Items ordered by descending score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    items: Vec<RecommendedItem>,
}

impl Recommendation {
    /// Keep only the first `n` items
    pub fn top(mut self, n: usize) -> Self {
        self.items.truncate(n);
        self
    }

    pub fn items(&self) -> &[RecommendedItem] {
        &self.items
    }

    /// Row identifiers in rank order
    pub fn row_ids(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.row_id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Attach a label to every item
    pub fn with_labels<F>(mut self, label_of: F) -> Self
    where
        F: Fn(usize) -> Option<String>,
    {
        for item in &mut self.items {
            item.label = label_of(item.row_id);
        }
        self
    }

    /// Rewrite row identifiers, e.g. from candidate positions to table rows
    pub(crate) fn map_row_ids<F>(mut self, map: F) -> Self
    where
        F: Fn(usize) -> usize,
    {
        for item in &mut self.items {
            item.row_id = map(item.row_id);
        }
        self
    }
}

impl IntoIterator for Recommendation {
    type Item = RecommendedItem;
    type IntoIter = std::vec::IntoIter<RecommendedItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Ranking entry points
pub struct Recommender;

impl Recommender {
    /// The `k` reference rows closest to `query`, nearest first
    pub fn by_similarity(
        index: &SimilarityIndex,
        query: &ArrayView1<f64>,
        k: usize,
    ) -> Result<Recommendation> {
        let items: Vec<RecommendedItem> = index
            .query(query, k)?
            .into_iter()
            .map(|n| RecommendedItem {
                row_id: n.row_id,
                score: -n.distance,
                label: None,
            })
            .collect();

        debug!(n_items = items.len(), k, "Ranked by similarity");
        Ok(Recommendation { items })
    }

    /// Candidates ranked by predicted score; `row_id` is the candidate's
    /// position in `candidates`
    pub fn by_score<R: Regressor + ?Sized>(model: &R, candidates: &Array2<f64>) -> Result<Recommendation> {
        if candidates.nrows() == 0 {
            return Ok(Recommendation::default());
        }

        let scores = model.predict(candidates)?;
        let mut items: Vec<RecommendedItem> = scores
            .iter()
            .enumerate()
            .map(|(row_id, &score)| RecommendedItem {
                row_id,
                score,
                label: None,
            })
            .collect();

        // Stable: equal scores keep candidate order
        items.sort_by(|a, b| descending(a.score, b.score));

        debug!(n_items = items.len(), "Ranked by predicted score");
        Ok(Recommendation { items })
    }
}

/// Descending order with NaN ranked last
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use ndarray::{array, Array1};

    /// Scores each row by its first column
    struct FirstColumn;

    impl Regressor for FirstColumn {
        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(x.column(0).to_owned())
        }

        fn n_features(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_by_score_descending_and_stable() {
        let candidates = array![[1.0], [5.0], [3.0], [5.0], [f64::NAN]];
        let rec = Recommender::by_score(&FirstColumn, &candidates).unwrap();

        assert_eq!(rec.row_ids(), vec![1, 3, 2, 0, 4]);
        assert!(rec.items()[..4].windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_by_score_empty() {
        let rec = Recommender::by_score(&FirstColumn, &Array2::zeros((0, 1))).unwrap();
        assert!(rec.is_empty());
    }

    #[test]
    fn test_by_similarity() {
        let index = SimilarityIndex::fit(array![[0.0, 0.0], [3.0, 4.0], [1.0, 1.0]], vec![7, 8, 9]).unwrap();
        let rec = Recommender::by_similarity(&index, &array![0.0, 0.0].view(), 2).unwrap();

        assert_eq!(rec.row_ids(), vec![7, 9]);
        assert_eq!(rec.items()[0].score, 0.0);
        assert!((rec.items()[1].score + 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_by_similarity_invalid_k() {
        let index = SimilarityIndex::fit(array![[0.0]], vec![0]).unwrap();
        assert!(matches!(
            Recommender::by_similarity(&index, &array![0.0].view(), 0),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_top_and_labels() {
        let candidates = array![[2.0], [9.0], [4.0]];
        let rec = Recommender::by_score(&FirstColumn, &candidates)
            .unwrap()
            .top(2)
            .with_labels(|row| Some(format!("item-{}", row)));

        assert_eq!(rec.len(), 2);
        assert_eq!(rec.items()[0].label.as_deref(), Some("item-1"));
        assert_eq!(rec.items()[1].label.as_deref(), Some("item-2"));
    }
}
