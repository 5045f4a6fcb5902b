//! One-hot encoding of categorical columns

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-hot expansion of a single categorical column.
///
/// Categories keep their order of first appearance, so the expanded
/// feature layout is a deterministic function of the input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    column: String,
    categories: Vec<String>,
    mapping: HashMap<String, usize>,
}

impl OneHotColumn {
    /// Build the vocabulary from a fully filled column
    pub fn fit<'a>(column: impl Into<String>, values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut categories = Vec::new();
        let mut mapping = HashMap::new();

        for val in values {
            if !mapping.contains_key(val) {
                mapping.insert(val.to_string(), categories.len());
                categories.push(val.to_string());
            }
        }

        Self {
            column: column.into(),
            categories,
            mapping,
        }
    }

    /// Source column name
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Observed categories in first-appearance order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of expanded features
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Expanded feature names, `column=category`
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|cat| format!("{}={}", self.column, cat))
            .collect()
    }

    /// Position of a category within the expansion
    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.mapping.get(category).copied()
    }

    /// Write the presence indicators for `category` into the first
    /// `width()` slots of `out`. Unknown categories encode as all zeros;
    /// indicators past the end of a short buffer are dropped.
    pub fn encode_into(&self, category: &str, out: &mut [f64]) {
        let width = self.width().min(out.len());
        out[..width].iter_mut().for_each(|v| *v = 0.0);
        if let Some(slot) = self.index_of(category).and_then(|idx| out[..width].get_mut(idx)) {
            *slot = 1.0;
        }
    }
}
