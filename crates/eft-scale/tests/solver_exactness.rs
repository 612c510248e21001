use eft_core::{EftError, Parameter};
use eft_scale::{
    ingest_events, solve, BinAccumulator, BinEdges, Couplings, EvalOpts, IngestOpts,
    QuadraticTruth, SampleGrid, SolveMode, SolveOpts, SynthOpts, TermKind, TermSolver,
};

fn fill_means(grid: &SampleGrid, means: &[Vec<f64>]) -> BinAccumulator {
    let mut acc = BinAccumulator::for_grid(grid, means[0].len());
    for (point, row) in means.iter().enumerate() {
        for (bin, mean) in row.iter().enumerate() {
            acc.add_event(point, bin, *mean).unwrap();
        }
    }
    acc
}

fn couplings(pairs: &[(&str, f64)]) -> Couplings {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * (1.0 + a.abs().max(b.abs()))
}

#[test]
fn recovers_linear_and_quadratic_coefficients() {
    // s0 = 10, f(x) = 3 x - 2 x^2, step = 0.5
    let grid = SampleGrid::build(&["cA"]).unwrap();
    let f = |x: f64| 10.0 + 3.0 * x - 2.0 * x * x;
    let acc = fill_means(&grid, &[vec![f(0.0)], vec![f(0.25)], vec![f(0.5)]]);
    let model = solve(&acc, &grid, &[0.5]).expect("solves");

    let linear = model.term(&["cA"]).expect("linear term");
    let quadratic = model.term(&["cA", "cA"]).expect("quadratic term");
    assert_eq!(linear.kind(), TermKind::Linear);
    assert_eq!(quadratic.kind(), TermKind::Quadratic);
    assert!(close(linear.values()[0], 0.3));
    assert!(close(quadratic.values()[0], -0.2));
    assert_eq!(linear.uncertainties()[0], 0.0);
    assert_eq!(model.nominal(), &[10.0]);
}

#[test]
fn cross_term_vanishes_without_interaction() {
    let grid = SampleGrid::build(&["p", "q"]).unwrap();
    let (sp, sq) = (0.5, 2.0);
    let f = |x: f64, y: f64| 4.0 * (1.0 + 0.2 * x + 0.1 * x * x - 0.3 * y + 0.05 * y * y);
    let means = vec![
        vec![f(0.0, 0.0)],
        vec![f(sp / 2.0, 0.0)],
        vec![f(sp, 0.0)],
        vec![f(0.0, sq / 2.0)],
        vec![f(0.0, sq)],
        vec![f(sp, 0.0) + f(0.0, sq) - f(0.0, 0.0)],
    ];
    let model = solve(&fill_means(&grid, &means), &grid, &[sp, sq]).unwrap();
    assert!(close(model.term(&["p", "q"]).unwrap().values()[0], 0.0));
    assert!(close(model.term(&["q"]).unwrap().values()[0], -0.3));
    assert!(close(model.term(&["q", "q"]).unwrap().values()[0], 0.05));
}

#[test]
fn recovers_cross_coefficient() {
    let grid = SampleGrid::build(&["p", "q"]).unwrap();
    let (sp, sq) = (0.5, 2.0);
    let f = |x: f64, y: f64| 4.0 * (1.0 + 0.2 * x + 0.1 * x * x + 0.7 * x * y);
    let means = vec![
        vec![f(0.0, 0.0)],
        vec![f(sp / 2.0, 0.0)],
        vec![f(sp, 0.0)],
        vec![f(0.0, sq / 2.0)],
        vec![f(0.0, sq)],
        vec![f(sp, sq)],
    ];
    let model = solve(&fill_means(&grid, &means), &grid, &[sp, sq]).unwrap();
    assert!(close(model.term(&["q", "p"]).unwrap().values()[0], 0.7));
    assert!(close(model.term(&["q"]).unwrap().values()[0], 0.0));
}

#[test]
fn uncertainties_follow_linear_combinations() {
    let grid = SampleGrid::build(&["p"]).unwrap();
    let mut acc = BinAccumulator::for_grid(&grid, 1);
    for weight in [1.0, 1.0] {
        acc.add_event(0, 0, weight).unwrap();
    }
    for weight in [1.0, 3.0] {
        acc.add_event(1, 0, weight).unwrap();
    }
    for weight in [2.0, 2.0] {
        acc.add_event(2, 0, weight).unwrap();
    }
    let model = solve(&acc, &grid, &[1.0]).unwrap();
    let half_err = (0.5f64).sqrt();
    let linear = model.term(&["p"]).unwrap();
    let quadratic = model.term(&["p", "p"]).unwrap();
    assert!(close(linear.values()[0], 3.0));
    assert!(close(linear.uncertainties()[0], 4.0 * half_err));
    assert!(close(quadratic.values()[0], -2.0));
    assert!(close(quadratic.uncertainties()[0], 4.0 * half_err));
}

#[test]
fn empty_reference_bin_yields_zero_coefficients() {
    let grid = SampleGrid::build(&["p", "q"]).unwrap();
    let mut acc = BinAccumulator::for_grid(&grid, 2);
    for point in 0..grid.len() {
        acc.add_event(point, 0, 1.0 + point as f64).unwrap();
        if point > 0 {
            acc.add_event(point, 1, 5.0).unwrap();
        }
    }
    let model = solve(&acc, &grid, &[1.0, 1.0]).unwrap();
    for term in model.terms() {
        assert_eq!(term.values()[1], 0.0);
        assert_eq!(term.uncertainties()[1], 0.0);
        assert!(term.values()[0].is_finite());
    }
    let scaled = model
        .evaluate(&vec![1.0, 1.0], &couplings(&[("p", 3.0), ("q", -2.0)]), &EvalOpts::default())
        .unwrap();
    assert_eq!(scaled.values[1], 1.0);
}

#[test]
fn solver_rejects_bad_steps_and_shapes() {
    let grid = SampleGrid::build(&["p", "q"]).unwrap();
    let err = TermSolver::new(&grid, &[1.0]).expect_err("one step per parameter");
    assert!(matches!(err, EftError::ShapeMismatch(_)));
    let err = TermSolver::new(&grid, &[1.0, 0.0]).expect_err("zero step");
    assert_eq!(err.info().code, "zero-step");

    let acc = BinAccumulator::new(3, 2);
    let solver = TermSolver::new(&grid, &[1.0, 1.0]).unwrap();
    let err = solver.solve(&acc, &SolveOpts::default()).expect_err("points differ");
    assert_eq!(err.info().code, "solver-shape");
}

#[test]
fn end_to_end_two_parameter_scenario() {
    let grid = SampleGrid::build(&["cG", "c2G"]).unwrap();
    let weights = [2.0, 3.0, 5.0, 2.5, 3.5, 6.5];
    let mut acc = BinAccumulator::for_grid(&grid, 1);
    for (point, weight) in weights.iter().enumerate() {
        for _ in 0..10 {
            acc.add_event(point, 0, *weight).unwrap();
        }
    }
    let model = solve(&acc, &grid, &[1.0, 1.0]).unwrap();
    assert_eq!(model.parameter_names(), vec!["c2G".to_string(), "cG".to_string()]);

    let at_cg = model
        .evaluate(model.nominal(), &couplings(&[("cG", 1.0), ("c2G", 0.0)]), &EvalOpts::default())
        .unwrap();
    assert!((at_cg.values[0] - 5.0).abs() <= 1e-9 + at_cg.uncertainties[0]);

    let at_both = model
        .evaluate(model.nominal(), &couplings(&[("cG", 1.0), ("c2G", 1.0)]), &EvalOpts::default())
        .unwrap();
    assert!(close(at_both.values[0], 6.5));

    let no_square = EvalOpts {
        quadratic: false,
        ..EvalOpts::default()
    };
    let linear_only = model
        .evaluate(model.nominal(), &couplings(&[("cG", 1.0)]), &no_square)
        .unwrap();
    assert!(close(linear_only.values[0], 3.0));
}

#[test]
fn decomposed_and_finite_difference_modes_agree() {
    let parameters = vec![Parameter::new("cA", 1.0), Parameter::new("cB", 0.5)];
    let grid = SampleGrid::build(&["cA", "cB"]).unwrap();
    let truth = QuadraticTruth::random(&parameters, 3, 11);
    let events = truth.events(&SynthOpts {
        events_per_bin: 25,
        noise: 0.2,
        seed: 5,
    });
    let steps: Vec<f64> = parameters.iter().map(Parameter::step).collect();
    let solver = TermSolver::new(&grid, &steps).unwrap();

    let raw = ingest_events(&grid, &parameters, &truth, &events, 3, &IngestOpts::default())
        .unwrap();
    let decomposed_acc = ingest_events(
        &grid,
        &parameters,
        &truth,
        &events,
        3,
        &IngestOpts {
            workers: 2,
            decompose: true,
        },
    )
    .unwrap();

    let fd = solver.solve(&raw, &SolveOpts::default()).unwrap();
    let decomposed = solver
        .solve(
            &decomposed_acc,
            &SolveOpts {
                mode: SolveMode::Decomposed,
            },
        )
        .unwrap();
    let exact = truth.to_model(BinEdges::default()).unwrap();
    for term in exact.terms() {
        for model in [&fd, &decomposed] {
            let solved = model.term(term.params()).expect("term present");
            for bin in 0..3 {
                assert!(
                    (solved.values()[bin] - term.values()[bin]).abs() < 1e-9,
                    "{:?} bin {bin}",
                    term.params()
                );
            }
        }
    }
}
