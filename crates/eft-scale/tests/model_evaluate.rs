use eft_core::EftError;
use eft_scale::{
    BinEdges, Couplings, EftTerm, EvalOpts, ExternalHistogram, Histogram, OneBased, ScalingModel,
};

fn term(params: &[&str], values: &[f64], uncertainties: &[f64]) -> EftTerm {
    EftTerm::new(
        params.iter().map(|p| p.to_string()).collect(),
        values.to_vec(),
        uncertainties.to_vec(),
    )
    .unwrap()
}

fn model() -> ScalingModel {
    ScalingModel::new(
        2,
        BinEdges::from_boundaries(&[0.0, 100.0, 250.0]),
        Some(vec!["low".into(), "high".into()]),
        vec![10.0, 4.0],
        vec![
            term(&["b", "a"], &[0.1, 0.0], &[0.01, 0.0]),
            term(&["a", "a"], &[0.2, 0.4], &[0.02, 0.04]),
            term(&["b"], &[-0.5, 0.25], &[0.05, 0.0]),
            term(&["a"], &[1.0, 2.0], &[0.1, 0.2]),
        ],
    )
    .unwrap()
}

fn couplings(pairs: &[(&str, f64)]) -> Couplings {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Bin storage numbered from 1, with an underflow slot at 0.
struct PlotHistogram {
    contents: Vec<f64>,
    errors: Vec<f64>,
}

impl ExternalHistogram for PlotHistogram {
    fn n_bins_x(&self) -> usize {
        self.contents.len() - 1
    }

    fn bin_content(&self, i: usize) -> f64 {
        self.contents[i]
    }

    fn bin_error(&self, i: usize) -> f64 {
        self.errors[i]
    }

    fn set_bin_content(&mut self, i: usize, value: f64) {
        self.contents[i] = value;
    }

    fn set_bin_error(&mut self, i: usize, value: f64) {
        self.errors[i] = value;
    }
}

#[test]
fn terms_are_stored_in_canonical_order() {
    let model = model();
    let order: Vec<Vec<String>> = model.terms().iter().map(|t| t.params().to_vec()).collect();
    assert_eq!(
        order,
        vec![
            vec!["a".to_string()],
            vec!["a".to_string(), "a".to_string()],
            vec!["b".to_string()],
            vec!["a".to_string(), "b".to_string()],
        ]
    );
    assert_eq!(model.parameter_names(), vec!["a".to_string(), "b".to_string()]);
    assert!(model.term(&["b", "a"]).is_some());
}

#[test]
fn zero_couplings_reproduce_nominal() {
    let model = model();
    let nominal = vec![3.0, 7.0];
    let scaled = model
        .evaluate(&nominal, &couplings(&[("a", 0.0), ("b", 0.0)]), &EvalOpts::default())
        .unwrap();
    assert_eq!(scaled.values, nominal);
    assert_eq!(scaled.uncertainties, vec![0.0, 0.0]);

    let missing = model.evaluate(&nominal, &Couplings::new(), &EvalOpts::default()).unwrap();
    assert_eq!(missing.values, nominal);
}

#[test]
fn categories_can_be_switched_off() {
    let model = model();
    let values = couplings(&[("a", 2.0), ("b", 1.0)]);
    let nominal = model.nominal().to_vec();

    let all = model.evaluate(&nominal, &values, &EvalOpts::default()).unwrap();
    // bin 0: 1 + 1.0*2 + 0.2*4 - 0.5*1 + 0.1*2
    assert!((all.values[0] - 10.0 * 3.5).abs() < 1e-12);
    let expected_err = (0.2f64.powi(2) + 0.08f64.powi(2) + 0.05f64.powi(2) + 0.02f64.powi(2)).sqrt();
    assert!((all.uncertainties[0] - 10.0 * expected_err).abs() < 1e-12);

    let linear = EvalOpts {
        quadratic: false,
        cross: false,
        ..EvalOpts::default()
    };
    let scaled = model.evaluate(&nominal, &values, &linear).unwrap();
    assert!((scaled.values[0] - 10.0 * 2.5).abs() < 1e-12);

    let no_cross = EvalOpts {
        cross: false,
        ..EvalOpts::default()
    };
    let scaled = model.evaluate(&nominal, &values, &no_cross).unwrap();
    assert!((scaled.values[0] - 10.0 * 3.3).abs() < 1e-12);
}

#[test]
fn evaluate_checks_bin_count() {
    let err = model()
        .evaluate(&vec![1.0; 3], &Couplings::new(), &EvalOpts::default())
        .expect_err("bin count differs");
    match err {
        EftError::ShapeMismatch(info) => {
            assert_eq!(info.context.get("field").map(String::as_str), Some("nominal"));
            assert_eq!(info.context.get("expected").map(String::as_str), Some("2"));
            assert_eq!(info.context.get("actual").map(String::as_str), Some("3"));
        }
        other => panic!("unexpected error variant: {:?}", other),
    }
}

#[test]
fn apply_scales_native_and_external_histograms() {
    let model = model();
    let values = couplings(&[("a", 1.0)]);

    let mut native = Histogram {
        contents: vec![10.0, 4.0],
        errors: vec![3.0, 0.0],
    };
    model.apply(&mut native, &values, &EvalOpts::default()).unwrap();
    assert!((native.contents[0] - 22.0).abs() < 1e-12);
    assert!((native.contents[1] - 13.6).abs() < 1e-12);
    let model_err = 10.0 * (0.1f64.powi(2) + 0.02f64.powi(2)).sqrt();
    assert!((native.errors[0] - (9.0 + model_err * model_err).sqrt()).abs() < 1e-12);

    let mut plot = OneBased(PlotHistogram {
        contents: vec![99.0, 10.0, 4.0],
        errors: vec![0.0; 3],
    });
    model.apply(&mut plot, &values, &EvalOpts::default()).unwrap();
    let plot = plot.into_inner();
    assert_eq!(plot.contents[0], 99.0);
    assert!((plot.contents[1] - 22.0).abs() < 1e-12);
    assert!((plot.contents[2] - 13.6).abs() < 1e-12);

    let mut plain = vec![1.0, 1.0];
    model.apply(&mut plain, &values, &EvalOpts::default()).unwrap();
    assert!((plain[0] - 2.2).abs() < 1e-12);
}

#[test]
fn duplicate_terms_and_bad_shapes_are_rejected() {
    let err = ScalingModel::new(
        1,
        BinEdges::default(),
        None,
        vec![1.0],
        vec![term(&["a", "b"], &[1.0], &[0.0]), term(&["b", "a"], &[2.0], &[0.0])],
    )
    .expect_err("same term twice");
    assert_eq!(err.info().code, "duplicate-term");

    let err = ScalingModel::new(2, BinEdges::default(), None, vec![1.0], Vec::new())
        .expect_err("sm_vals too short");
    assert!(matches!(err, EftError::ShapeMismatch(_)));

    let err = EftTerm::new(
        vec!["a".into(), "b".into(), "c".into()],
        vec![0.0],
        vec![0.0],
    )
    .expect_err("cubic");
    assert_eq!(err.info().code, "term-degree");
}

#[test]
fn pruning_drops_small_terms() {
    let model = model();
    let pruned = model.pruned(0.3, false);
    let kept: Vec<usize> = pruned.terms().iter().map(|t| t.params().len()).collect();
    assert_eq!(kept, vec![1, 2, 1]);
    assert!(pruned.term(&["a", "b"]).is_none());

    let relative = model.pruned(0.15, true);
    assert_eq!(relative.terms().len(), 3);
    assert_eq!(relative.nominal(), model.nominal());
}

#[test]
fn two_dimensional_edges_unroll_along_y() {
    let edges = BinEdges::TwoD(vec![
        [[0.0, 1.0], [0.0, 2.0]],
        [[0.0, 1.0], [2.0, 5.0]],
    ]);
    assert!(edges.is_two_d());
    assert_eq!(edges.widths(), vec![2.0, 3.0]);
    assert_eq!(edges.unrolled(), vec![[0.0, 2.0], [2.0, 5.0]]);
}
