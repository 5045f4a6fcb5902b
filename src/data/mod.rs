//! Tabular input data
//!
//! Provides the in-memory table the rest of the pipeline consumes:
//! - Raw rows of named scalar cells ([`RawRow`], [`Value`])
//! - Forward-fill of missing cells and one-hot encoding of categories
//! - Reproducible train/test partitioning

mod encoder;
mod split;
mod table;

pub use encoder::OneHotColumn;
pub use split::{Split, Splitter};
pub use table::{FeatureTable, TableConfig};

use serde::{Deserialize, Serialize};

/// A single raw cell as supplied by an external loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Numeric cell (`NaN` is treated as missing)
    Number(f64),
    /// Categorical cell, one-hot encoded on load
    Category(String),
    /// Absent cell, forward-filled on load
    Missing,
}

impl Value {
    /// Whether the cell needs filling
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Number(v) => v.is_nan(),
            Value::Category(_) => false,
            Value::Missing => true,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Category(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Category(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

/// One input row: column name to cell, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, Value)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a cell
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a cell, replacing any previous value for the column
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Look up a cell by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}
