use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};
use single_nmf::nmf::{ConvexNmf, NoopObserver, StandardNmf};
use std::hint::black_box;
use std::time::Duration;

#[derive(Clone)]
pub struct FactorizationConfig {
    seed: u64,
    matrix_sizes: Vec<(usize, usize)>,
    ranks: Vec<usize>,
    iterations: usize,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            matrix_sizes: vec![(50, 20), (200, 100), (500, 250)],
            ranks: vec![2, 5, 10],
            iterations: 20,
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

fn create_test_matrix(rows: usize, cols: usize, low: f64, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value_dist = Uniform::try_from(low..1.0).unwrap();
    Array2::from_shape_simple_fn((rows, cols), || value_dist.sample(&mut rng))
}

fn configure_group<'a, M: Measurement>(
    c: &'a mut Criterion<M>,
    name: &str,
    config: &FactorizationConfig,
) -> BenchmarkGroup<'a, M> {
    let mut group = c.benchmark_group(name);
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);
    group
}

fn bench_convex(c: &mut Criterion) {
    let config = FactorizationConfig::default();
    let mut group = configure_group(c, "convex_nmf", &config);

    for &(rows, cols) in &config.matrix_sizes {
        // Mixed-sign input exercises both halves of the signed Gram split.
        let x = create_test_matrix(rows, cols, -0.5, config.seed);
        for &rank in config.ranks.iter().filter(|&&r| r < cols) {
            let nmf = ConvexNmf::new(rank, 1e-12, config.iterations, config.seed);
            group.bench_with_input(
                BenchmarkId::new(format!("{}x{}", rows, cols), rank),
                &x,
                |b, x| {
                    b.iter(|| {
                        black_box(
                            nmf.fit_with_observer(x.view(), &mut NoopObserver)
                                .unwrap(),
                        )
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_standard(c: &mut Criterion) {
    let config = FactorizationConfig::default();
    let mut group = configure_group(c, "standard_nmf", &config);

    for &(rows, cols) in &config.matrix_sizes {
        let v = create_test_matrix(rows, cols, 0.0, config.seed);
        for &rank in config.ranks.iter().filter(|&&r| r < cols) {
            group.bench_with_input(
                BenchmarkId::new(format!("{}x{}", rows, cols), rank),
                &v,
                |b, v| {
                    b.iter(|| {
                        let session =
                            StandardNmf::new(v.view(), rank, config.iterations, 1e-12, config.seed)
                                .unwrap();
                        black_box(session.factorize_with_observer(&mut NoopObserver).unwrap())
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_convex, bench_standard);
criterion_main!(benches);
