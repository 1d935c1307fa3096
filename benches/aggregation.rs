use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{ArrayD, IxDyn};
use mplc::contributivity::FnCharacteristic;
use mplc::{
    weighted_average, Coalition, ContributivityConfig, ContributivityEstimator,
    ContributivityMethod, ParamSnapshot,
};

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for &n_partners in &[3, 10, 50] {
        for &n_params in &[1_000usize, 100_000, 1_000_000] {
            let snapshots: Vec<ParamSnapshot> = (0..n_partners)
                .map(|i| {
                    ParamSnapshot::new(vec![
                        ArrayD::from_shape_fn(IxDyn(&[n_params / 10, 10]), |idx| {
                            ((i * n_params + idx[0] * 10 + idx[1]) as f32).sin()
                        }),
                        ArrayD::from_elem(IxDyn(&[10]), i as f32),
                    ])
                })
                .collect();
            let weights: Vec<f64> = (1..=n_partners).map(|v| v as f64).collect();

            let id = format!("{}p_{}w", n_partners, n_params);

            group.bench_with_input(
                BenchmarkId::new("weighted_average", &id),
                &(snapshots, weights),
                |b, (snapshots, weights)| b.iter(|| weighted_average(snapshots, weights).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_shapley(c: &mut Criterion) {
    let mut group = c.benchmark_group("shapley");

    for &n_partners in &[4usize, 8, 12] {
        let ids: Vec<usize> = (0..n_partners).collect();
        let game = FnCharacteristic::new(ids, |s: &Coalition| {
            let w: f64 = s.members().iter().map(|&id| (id + 1) as f64).sum();
            Ok(w.sqrt())
        });
        let config = ContributivityConfig::default().with_sample_count(100);
        let estimator = ContributivityEstimator::new(&game, config).unwrap();

        group.bench_with_input(
            BenchmarkId::new("exact", n_partners),
            &estimator,
            |b, estimator| b.iter(|| estimator.compute(ContributivityMethod::ShapleyValues).unwrap()),
        );

        group.bench_with_input(
            BenchmarkId::new("monte_carlo", n_partners),
            &estimator,
            |b, estimator| {
                b.iter(|| estimator.compute(ContributivityMethod::MonteCarloShapley).unwrap())
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_shapley);
criterion_main!(benches);
