//! Integration test: loading, splitting, scaling and reduction

use ndarray::{array, Array2};
use tabpredict::prelude::*;

fn rows() -> Vec<RawRow> {
    vec![
        RawRow::new().with("id", "a").with("size", "M").with("price", 10.0).with("stock", 3.0).with("sales", 1.0),
        RawRow::new().with("id", "b").with("size", Value::Missing).with("price", 12.0).with("sales", 2.0),
        RawRow::new().with("id", "c").with("size", "S").with("price", f64::NAN).with("stock", 7.0).with("sales", 3.0),
        RawRow::new().with("id", "d").with("size", "L").with("price", 20.0).with("stock", 1.0).with("sales", 4.0),
    ]
}

#[test]
fn test_load_forward_fills_and_encodes() {
    let table = FeatureTable::load(&rows(), &TableConfig::new("sales").with_id_column("id")).unwrap();

    assert_eq!(table.feature_names(), &["size=M", "size=S", "size=L", "price", "stock"]);
    assert_eq!(table.n_rows(), 4);
    // Row b: size filled from row a, stock absent and filled from row a
    assert_eq!(table.features().row(1).to_vec(), vec![1.0, 0.0, 0.0, 12.0, 3.0]);
    // Row c: price filled from row b
    assert_eq!(table.features()[[2, 3]], 12.0);
    assert_eq!(table.item_label(3), Some("d"));
    assert_eq!(table.encoded_columns()[0].categories(), &["M", "S", "L"]);
}

#[test]
fn test_id_column_must_be_present() {
    let mut rows = rows();
    rows.push(RawRow::new().with("size", "S").with("price", 1.0).with("stock", 1.0).with("sales", 1.0));
    let err = FeatureTable::load(&rows, &TableConfig::new("sales").with_id_column("id")).unwrap_err();
    assert!(matches!(err, PipelineError::DataError(_)));
}

#[test]
fn test_categorical_target_rejected() {
    let err = FeatureTable::load(&rows(), &TableConfig::new("size")).unwrap_err();
    assert!(matches!(err, PipelineError::DataError(_)));
}

#[test]
fn test_split_partition_property() {
    for seed in 0..10 {
        for n in [1, 2, 5, 17, 64] {
            let split = Splitter::new(0.3, seed).split_indices(n).unwrap();
            let mut all: Vec<usize> = split.train_indices.clone();
            all.extend(&split.test_indices);
            all.sort_unstable();
            assert_eq!(all, (0..n).collect::<Vec<_>>(), "seed {} n {}", seed, n);
            assert!(split.train_indices.windows(2).all(|w| w[0] < w[1]));
            assert!(split.test_indices.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

#[test]
fn test_split_tiny_table_may_be_empty() {
    // round(0.3 * 1) = 0 test rows
    let split = Splitter::new(0.3, 0).split_indices(1).unwrap();
    assert!(split.test_indices.is_empty());
    assert_eq!(split.train_indices, vec![0]);
}

#[test]
fn test_scaler_uses_train_statistics_only() {
    let train = array![[1.0, 100.0], [3.0, 300.0]];
    let test = array![[5.0, 500.0]];
    let state = StandardScaler::new().fit(&train).unwrap();

    // Train mean [2, 200], std [1, 100]
    let scaled = state.transform(&test).unwrap();
    assert!((scaled[[0, 0]] - 3.0).abs() < 1e-12);
    assert!((scaled[[0, 1]] - 3.0).abs() < 1e-12);
}

#[test]
fn test_scaler_degenerate_round_trip() {
    let x = array![[1.0, 7.0, 2.0], [2.0, 7.0, 4.0], [3.0, 7.0, 9.0]];
    let state = StandardScaler::new().fit(&x).unwrap();
    let scaled = state.transform(&x).unwrap();

    for (j, col) in scaled.columns().into_iter().enumerate() {
        assert!(col.mean().unwrap().abs() < 1e-10, "column {}", j);
        let expected_std = if j == 1 { 0.0 } else { 1.0 };
        assert!((col.std(0.0) - expected_std).abs() < 1e-10, "column {}", j);
    }
}

#[test]
fn test_pca_fixed_width_for_any_row_count() {
    let x = array![
        [2.5, 2.4, 0.5],
        [0.5, 0.7, 1.5],
        [2.2, 2.9, 0.1],
        [1.9, 2.2, 0.9],
        [3.1, 3.0, 0.3],
        [2.3, 2.7, 1.1],
    ];
    let scaled = StandardScaler::new().fit(&x).unwrap().transform(&x).unwrap();

    for k in 1..=3 {
        let state = Pca::new(k).fit(&scaled).unwrap();
        for n in [0, 1, 4] {
            let rows = Array2::from_shape_fn((n, 3), |(i, j)| (i + j) as f64);
            assert_eq!(state.transform(&rows).unwrap().dim(), (n, k));
        }
        let ratios = state.explained_variance_ratio();
        assert!(ratios.windows(2).into_iter().all(|w| w[0] >= w[1] - 1e-9));
    }
}

#[test]
fn test_pca_rejects_bad_dimensions() {
    let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 3.0]];
    assert_eq!(
        Pca::new(3).fit(&x).unwrap_err(),
        PipelineError::InvalidDimension { requested: 3, available: 2 }
    );
}
