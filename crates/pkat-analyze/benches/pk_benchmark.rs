use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use pkat_analyze::{
    EnsembleMatrix, PkParameterSet, SaMethod, SensitivityEngine, SensitivityProblem,
    DEFAULT_PROBS, DEFAULT_TAIL_POINTS,
};

fn decay_curve(n: usize) -> (Vec<f64>, Vec<f64>) {
    let t: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
    let c: Vec<f64> = t.iter().map(|&ti| 100.0 * (-0.15 * ti).exp()).collect();
    (t, c)
}

fn bench_pk_parameters(c: &mut Criterion) {
    let mut group = c.benchmark_group("pk_parameters");
    for n in [24usize, 96, 480] {
        let (t, conc) = decay_curve(n);
        group.bench_with_input(BenchmarkId::new("full_set", n), &n, |b, _| {
            b.iter(|| {
                PkParameterSet::compute(
                    black_box(&t),
                    black_box(&conc),
                    Some(100.0),
                    DEFAULT_TAIL_POINTS,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_quantile_bands(c: &mut Criterion) {
    let (_, conc) = decay_curve(48);
    let mut group = c.benchmark_group("quantile_bands");
    for n_draws in [100usize, 1000] {
        let rows: Vec<Vec<f64>> = (0..n_draws)
            .map(|i| {
                let f = 1.0 + 0.001 * i as f64;
                conc.iter().map(|&v| v * f).collect()
            })
            .collect();
        let m = EnsembleMatrix::from_rows(rows).unwrap();
        group.bench_with_input(BenchmarkId::new("bands", n_draws), &n_draws, |b, _| {
            b.iter(|| black_box(&m).quantiles(DEFAULT_PROBS).unwrap())
        });
    }
    group.finish();
}

fn bench_sobol_analysis(c: &mut Criterion) {
    let problem = SensitivityProblem {
        num_vars: 4,
        names: (0..4).map(|i| format!("p{i}")).collect(),
        bounds: vec![(0.0, 1.0); 4],
    };
    let engine = SensitivityEngine::new(problem, SaMethod::Sobol, 1024, 7).unwrap();
    let rows = engine.sample().unwrap();
    let y: Vec<f64> = rows.iter().map(|r| r[0] + 2.0 * r[1] + r[2] * r[3]).collect();

    c.bench_function("sobol_analyze_1024x4", |b| {
        b.iter(|| engine.analyze(black_box(&y)).unwrap())
    });
}

criterion_group!(benches, bench_pk_parameters, bench_quantile_bands, bench_sobol_analysis);
criterion_main!(benches);
