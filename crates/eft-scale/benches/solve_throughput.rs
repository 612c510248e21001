use eft_core::Parameter;
use eft_scale::{solve, Couplings, EvalOpts, QuadraticTruth, SampleGrid, SynthOpts};
use criterion::{criterion_group, criterion_main, Criterion};

fn parameters() -> Vec<Parameter> {
    (0..6)
        .map(|i| Parameter::new(format!("c{i}"), 0.5 + 0.25 * i as f64))
        .collect()
}

fn bench_solve(c: &mut Criterion) {
    let parameters = parameters();
    let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    let steps: Vec<f64> = parameters.iter().map(Parameter::step).collect();
    let grid = SampleGrid::build(&names).unwrap();
    let truth = QuadraticTruth::random(&parameters, 64, 17);
    let acc = truth
        .fill_independent(
            &grid,
            &parameters,
            &SynthOpts {
                events_per_bin: 20,
                noise: 0.1,
                seed: 17,
            },
        )
        .unwrap();

    c.bench_function("solve_6_params_64_bins", |b| {
        b.iter(|| {
            let _ = solve(&acc, &grid, &steps).expect("solve");
        });
    });

    let model = solve(&acc, &grid, &steps).unwrap();
    let couplings: Couplings = names.iter().map(|n| (n.clone(), 0.3)).collect();
    c.bench_function("evaluate_6_params_64_bins", |b| {
        b.iter(|| {
            let _ = model
                .evaluate(model.nominal(), &couplings, &EvalOpts::default())
                .expect("evaluate");
        });
    });
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
