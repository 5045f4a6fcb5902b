use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tabpredict::prelude::*;

fn create_regression_table(n_rows: usize, n_features: usize) -> FeatureTable {
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let rows: Vec<RawRow> = (0..n_rows)
        .map(|_| {
            let mut row = RawRow::new();
            let mut target = 0.0;
            for j in 0..n_features {
                let v = rng.gen::<f64>() * 10.0;
                target += v;
                row.set(format!("feature_{}", j), v);
            }
            // Create target as sum of features + noise
            row.set("target", target + rng.gen::<f64>() * 0.1);
            row
        })
        .collect();

    FeatureTable::load(&rows, &TableConfig::new("target")).unwrap()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let table = create_regression_table(*n_rows, 10);

        for (name, strategy) in [
            ("forest", ModelStrategy::EnsembleRegression),
            ("linear", ModelStrategy::LinearRegression),
            ("similarity", ModelStrategy::Similarity),
        ] {
            let config = PipelineConfig::new()
                .with_model_strategy(strategy)
                .with_forest(ForestConfig::new(20).with_max_depth(10));

            group.bench_with_input(BenchmarkId::new(name, n_rows), &table, |b, table| {
                b.iter(|| Pipeline::new(config.clone()).fit(black_box(table)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity_query");

    for n_rows in [1000, 10000].iter() {
        let table = create_regression_table(*n_rows, 10);
        let fitted = Pipeline::new(
            PipelineConfig::new()
                .with_model_strategy(ModelStrategy::Similarity)
                .with_reduced_dimensions(4),
        )
        .fit(&table)
        .unwrap();
        let query = table.features().row(0).to_owned();

        group.bench_with_input(BenchmarkId::new("top10", n_rows), &query, |b, query| {
            b.iter(|| fitted.recommend_similar(black_box(&query.view()), 10).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_query);
criterion_main!(benches);
