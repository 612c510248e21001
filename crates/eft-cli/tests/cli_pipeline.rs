use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

const CONFIG: &str = r#"{
    "parameter_defaults": {"block": "newcoup", "val": 1.0, "sm": 0.0, "gen": 0.0},
    "parameters": [
        {"name": "cG", "index": 2},
        {"name": "c2G", "index": 33, "val": 0.5}
    ]
}"#;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_eftscale"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_ok(args: &[&str]) -> String {
    let out = run(args);
    assert!(
        out.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).expect("utf8 stdout")
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("read output");
    serde_json::from_str(&text).expect("valid json")
}

fn s(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn points_lists_the_grid() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, CONFIG).unwrap();

    let stdout = run_ok(&["points", "--config", s(&config)]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["parameters"], serde_json::json!(["cG", "c2G"]));
    let points = value["points"].as_array().unwrap();
    assert_eq!(points.len(), 6);
    assert_eq!(points[0]["params"], serde_json::json!([]));
    assert_eq!(points[0]["values"], serde_json::json!([0.0, 0.0]));
}

#[test]
fn demo_solve_evaluate_and_export_agree() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, CONFIG).unwrap();
    let out_dir = dir.path().join("demo");

    run_ok(&[
        "demo",
        "--config",
        s(&config),
        "--bins",
        "3",
        "--events",
        "200",
        "--seed",
        "11",
        "--workers",
        "2",
        "--out",
        s(&out_dir),
    ]);

    // correlated jitter cancels in the ratios, so the closure is exact up to rounding
    let closure = read_json(&out_dir.join("closure.json"));
    let terms = closure["terms"].as_array().unwrap();
    assert_eq!(terms.len(), 5);
    for term in terms {
        assert!(term["max_abs_deviation"].as_f64().unwrap() < 1e-8, "{term}");
    }

    let merged = dir.path().join("merged.json");
    let stats = out_dir.join("stats.json");
    run_ok(&["merge", "--inputs", s(&stats), s(&stats), "--out", s(&merged)]);
    let resolved = dir.path().join("resolved.json");
    run_ok(&[
        "solve",
        "--stats",
        s(&merged),
        "--config",
        s(&config),
        "--out",
        s(&resolved),
    ]);
    let original = read_json(&out_dir.join("model.json"));
    let doubled = read_json(&resolved);
    assert_eq!(original["nbins"], doubled["nbins"]);
    for (a, b) in original["terms"]
        .as_array()
        .unwrap()
        .iter()
        .zip(doubled["terms"].as_array().unwrap())
    {
        assert_eq!(a[0], b[0]);
        for (x, y) in a[1].as_array().unwrap().iter().zip(b[1].as_array().unwrap()) {
            assert!((x.as_f64().unwrap() - y.as_f64().unwrap()).abs() < 1e-12);
        }
    }

    let model = out_dir.join("model.json");
    let stdout = run_ok(&["evaluate", "--model", s(&model), "--set", "cG=0", "--set", "c2G=0"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["values"], value["nominal"]);

    let stdout = run_ok(&["export", "--model", s(&model), "--format", "text"]);
    assert_eq!(stdout.lines().filter(|l| !l.is_empty()).count(), 3);
    assert!(stdout.starts_with("0-1:1 + "));

    let translate = dir.path().join("names.json");
    std::fs::write(&translate, r#"{"cG": "c_{G}"}"#).unwrap();
    let report = dir.path().join("report");
    run_ok(&[
        "export",
        "--model",
        s(&model),
        "--format",
        "latex",
        "--translate",
        s(&translate),
        "--out",
        s(&report),
    ]);
    let latex = std::fs::read_to_string(dir.path().join("report.tex")).expect("latex written");
    assert!(latex.contains("c_{G}"));
}

#[test]
fn merge_zeroes_selected_terms() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, CONFIG).unwrap();
    let out_dir = dir.path().join("demo");
    run_ok(&[
        "demo", "--config", s(&config), "--bins", "2", "--events", "20", "--out", s(&out_dir),
    ]);

    let zeroed = dir.path().join("zeroed.json");
    let stats = out_dir.join("stats.json");
    run_ok(&[
        "merge", "--inputs", s(&stats), "--zero", "cG,c2G", "--out", s(&zeroed),
    ]);
    let value = read_json(&zeroed);
    let terms = value["terms"].as_array().unwrap();
    let cross = terms
        .iter()
        .position(|t| t.as_array().map(Vec::len) == Some(2) && t[0] != t[1])
        .expect("cross point");
    assert_eq!(value["sumW"][cross], serde_json::json!([0.0, 0.0]));
    assert_ne!(value["numEntries"][cross], serde_json::json!([0, 0]));
}

#[test]
fn bad_arguments_fail_cleanly() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    let out = run(&["evaluate", "--model", s(&missing)]);
    assert!(!out.status.success());

    let out = run(&["evaluate", "--model", s(&missing), "--set", "cG"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("name=value"));
}
