//! Cleaned and encoded feature table

use super::encoder::OneHotColumn;
use super::{RawRow, Value};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Schema options for building a [`FeatureTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Target column name
    pub target_column: String,
    /// Item identifier column, excluded from features
    pub id_column: Option<String>,
    /// Feature column names (None = all except target and id)
    pub feature_columns: Option<Vec<String>>,
}

impl TableConfig {
    /// Create a configuration with the given target column
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            id_column: None,
            feature_columns: None,
        }
    }

    /// Builder method to set the item identifier column
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Builder method to restrict the feature columns
    pub fn with_feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Kind of a raw column, decided from its non-missing cells
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Numeric,
    Categorical,
}

/// Immutable rows x features matrix with a designated target.
///
/// Built once by [`FeatureTable::load`]; every later stage derives new
/// values from it instead of mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target_name: String,
    target: Array1<f64>,
    labels: Option<Vec<String>>,
    encoded_columns: Vec<OneHotColumn>,
}

impl FeatureTable {
    /// Clean and encode raw rows.
    ///
    /// Missing cells are forward-filled down each column. A column whose
    /// first rows are missing has nothing to carry forward, and loading
    /// fails instead of inventing a value.
    pub fn load(rows: &[RawRow], config: &TableConfig) -> Result<Self> {
        let columns = column_order(rows);

        if !columns.iter().any(|c| c == &config.target_column) {
            return Err(PipelineError::DataError(format!(
                "target column '{}' not found",
                config.target_column
            )));
        }

        let labels = match &config.id_column {
            Some(id) => Some(extract_labels(rows, id, &columns)?),
            None => None,
        };

        let feature_columns = select_feature_columns(&columns, config)?;

        // Target
        let target_cells = forward_fill(&config.target_column, column_cells(rows, &config.target_column))?;
        if column_kind(&config.target_column, &target_cells)? != ColumnKind::Numeric {
            return Err(PipelineError::DataError(format!(
                "target column '{}' must be numeric",
                config.target_column
            )));
        }
        let target: Array1<f64> = target_cells.iter().map(number_of).collect();

        // Features, expanded in source column order
        let mut feature_names = Vec::new();
        let mut encoded_columns = Vec::new();
        let mut blocks: Vec<Array2<f64>> = Vec::with_capacity(feature_columns.len());

        for name in &feature_columns {
            let cells = forward_fill(name, column_cells(rows, name))?;
            match column_kind(name, &cells)? {
                ColumnKind::Numeric => {
                    let values: Vec<f64> = cells.iter().map(number_of).collect();
                    blocks.push(Array2::from_shape_vec((rows.len(), 1), values)?);
                    feature_names.push(name.clone());
                }
                ColumnKind::Categorical => {
                    let encoder = OneHotColumn::fit(name.as_str(), cells.iter().map(category_of));
                    let mut block = Array2::zeros((rows.len(), encoder.width()));
                    for (i, cell) in cells.iter().enumerate() {
                        if let Some(slice) = block.row_mut(i).as_slice_mut() {
                            encoder.encode_into(category_of(cell), slice);
                        }
                    }
                    feature_names.extend(encoder.feature_names());
                    blocks.push(block);
                    encoded_columns.push(encoder);
                }
            }
        }

        let features = if blocks.is_empty() {
            Array2::zeros((rows.len(), 0))
        } else {
            let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
            ndarray::concatenate(Axis(1), &views)?
        };

        debug!(
            n_rows = features.nrows(),
            n_features = features.ncols(),
            n_encoded = encoded_columns.len(),
            "Loaded feature table"
        );

        Ok(Self {
            feature_names,
            features,
            target_name: config.target_column.clone(),
            target,
            labels,
            encoded_columns,
        })
    }

    /// New table holding the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows()) {
            return Err(PipelineError::DataError(format!(
                "row index {} out of range for table with {} rows",
                bad,
                self.n_rows()
            )));
        }

        Ok(Self {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            target_name: self.target_name.clone(),
            target: self.target.select(Axis(0), indices),
            labels: self
                .labels
                .as_ref()
                .map(|labels| indices.iter().map(|&i| labels[i].clone()).collect()),
            encoded_columns: self.encoded_columns.clone(),
        })
    }

    /// Feature matrix (rows x encoded features)
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Target values, one per row
    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Encoded feature names, aligned with the feature matrix columns
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Categorical columns that were one-hot expanded
    pub fn encoded_columns(&self) -> &[OneHotColumn] {
        &self.encoded_columns
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Item identifiers of all rows, when an id column was configured
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Item identifier of a row, when an id column was configured
    pub fn item_label(&self, row: usize) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(row))
            .map(String::as_str)
    }
}

/// Column names in order of first appearance across rows
fn column_order(rows: &[RawRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.columns() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn column_cells(rows: &[RawRow], column: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(column).cloned().unwrap_or(Value::Missing))
        .collect()
}

fn select_feature_columns(columns: &[String], config: &TableConfig) -> Result<Vec<String>> {
    let excluded = |name: &str| {
        name == config.target_column || config.id_column.as_deref() == Some(name)
    };

    match &config.feature_columns {
        Some(selected) => {
            for name in selected {
                if !columns.contains(name) {
                    return Err(PipelineError::DataError(format!(
                        "feature column '{}' not found",
                        name
                    )));
                }
                if excluded(name.as_str()) {
                    return Err(PipelineError::DataError(format!(
                        "column '{}' cannot be both a feature and the target or id",
                        name
                    )));
                }
            }
            Ok(selected.clone())
        }
        None => Ok(columns.iter().filter(|c| !excluded(c.as_str())).cloned().collect()),
    }
}

fn extract_labels(rows: &[RawRow], id_column: &str, columns: &[String]) -> Result<Vec<String>> {
    if !columns.iter().any(|c| c == id_column) {
        return Err(PipelineError::DataError(format!(
            "id column '{}' not found",
            id_column
        )));
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.get(id_column) {
            Some(Value::Category(s)) => Ok(s.clone()),
            Some(Value::Number(v)) if !v.is_nan() => Ok(v.to_string()),
            _ => Err(PipelineError::DataError(format!(
                "id column '{}' is missing at row {}",
                id_column, i
            ))),
        })
        .collect()
}

/// Carry the last present value down the column
fn forward_fill(column: &str, cells: Vec<Value>) -> Result<Vec<Value>> {
    let mut last: Option<Value> = None;
    let mut filled = Vec::with_capacity(cells.len());

    for (i, cell) in cells.into_iter().enumerate() {
        if cell.is_missing() {
            match &last {
                Some(prev) => filled.push(prev.clone()),
                None => {
                    return Err(PipelineError::DataError(format!(
                        "column '{}' is missing at row {} with no earlier value to fill from",
                        column, i
                    )))
                }
            }
        } else {
            last = Some(cell.clone());
            filled.push(cell);
        }
    }

    Ok(filled)
}

fn column_kind(column: &str, cells: &[Value]) -> Result<ColumnKind> {
    let has_number = cells.iter().any(|c| matches!(c, Value::Number(_)));
    let has_category = cells.iter().any(|c| matches!(c, Value::Category(_)));

    match (has_number, has_category) {
        (true, true) => Err(PipelineError::DataError(format!(
            "column '{}' mixes numeric and categorical values",
            column
        ))),
        (false, true) => Ok(ColumnKind::Categorical),
        _ => Ok(ColumnKind::Numeric),
    }
}

fn number_of(cell: &Value) -> f64 {
    match cell {
        Value::Number(v) => *v,
        _ => f64::NAN,
    }
}

fn category_of(cell: &Value) -> &str {
    match cell {
        Value::Category(s) => s.as_str(),
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<RawRow> {
        vec![
            RawRow::new().with("sku", "A").with("price", 10.0).with("color", "red").with("sales", 5.0),
            RawRow::new().with("sku", "B").with("price", Value::Missing).with("color", "blue").with("sales", 7.0),
            RawRow::new().with("sku", "C").with("price", 14.0).with("color", "red").with("sales", 9.0),
        ]
    }

    #[test]
    fn test_load_encodes_and_fills() {
        let config = TableConfig::new("sales").with_id_column("sku");
        let table = FeatureTable::load(&rows(), &config).unwrap();

        assert_eq!(table.feature_names(), &["price", "color=red", "color=blue"]);
        assert_eq!(table.n_rows(), 3);
        // Forward filled from row 0
        assert_eq!(table.features()[[1, 0]], 10.0);
        assert_eq!(table.features().row(1).to_vec(), vec![10.0, 0.0, 1.0]);
        assert_eq!(table.target().to_vec(), vec![5.0, 7.0, 9.0]);
        assert_eq!(table.item_label(2), Some("C"));
    }

    #[test]
    fn test_missing_target_column() {
        let config = TableConfig::new("demand");
        let err = FeatureTable::load(&rows(), &config).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
    }

    #[test]
    fn test_leading_missing_fails() {
        let rows = vec![
            RawRow::new().with("x", f64::NAN).with("y", 1.0),
            RawRow::new().with("x", 2.0).with("y", 2.0),
        ];
        let err = FeatureTable::load(&rows, &TableConfig::new("y")).unwrap_err();
        match err {
            PipelineError::DataError(msg) => assert!(msg.contains("'x'") && msg.contains("row 0")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_mixed_column_fails() {
        let rows = vec![
            RawRow::new().with("x", 1.0).with("y", 1.0),
            RawRow::new().with("x", "one").with("y", 2.0),
        ];
        assert!(FeatureTable::load(&rows, &TableConfig::new("y")).is_err());
    }

    #[test]
    fn test_feature_selection() {
        let config = TableConfig::new("sales")
            .with_id_column("sku")
            .with_feature_columns(["color"]);
        let table = FeatureTable::load(&rows(), &config).unwrap();
        assert_eq!(table.n_features(), 2);

        let bad = TableConfig::new("sales").with_feature_columns(["weight"]);
        assert!(FeatureTable::load(&rows(), &bad).is_err());
    }

    #[test]
    fn test_subset_keeps_order() {
        let config = TableConfig::new("sales").with_id_column("sku");
        let table = FeatureTable::load(&rows(), &config).unwrap();
        let sub = table.subset(&[2, 0]).unwrap();

        assert_eq!(sub.target().to_vec(), vec![9.0, 5.0]);
        assert_eq!(sub.item_label(0), Some("C"));
        assert!(table.subset(&[3]).is_err());
    }
}
