use std::collections::BTreeMap;
use std::fs;
use std::iter::FromIterator;
use std::path::Path;

use eft_core::errors::{EftError, ErrorInfo};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::accumulator::BinAccumulator;
use crate::grid::SampleGrid;
use crate::model::{BinEdges, EftTerm, ScalingModel};

fn serde_error(code: &str, err: impl ToString) -> EftError {
    EftError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn io_error(code: &str, path: &Path, err: impl ToString) -> EftError {
    EftError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, EftError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, EftError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-deserialize", err))
}

fn read_file(path: &Path, code: &str) -> Result<String, EftError> {
    fs::read_to_string(path).map_err(|err| io_error(code, path, err))
}

fn write_file(path: &Path, code: &str, contents: &str) -> Result<(), EftError> {
    fs::write(path, contents).map_err(|err| io_error(code, path, err))
}

/// On-disk shape of a [`ScalingModel`].
#[derive(Debug, Serialize, Deserialize)]
struct ScalingDocument {
    terms: Vec<(Vec<String>, Vec<f64>, Vec<f64>)>,
    nbins: usize,
    sm_vals: Vec<f64>,
    bin_edges: BinEdges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bin_labels: Option<Vec<String>>,
    /// Informational only; ignored when reading.
    #[serde(default, skip_deserializing)]
    parameters: Vec<String>,
}

/// Serializes a model into the scaling-model document.
pub fn model_to_json(model: &ScalingModel) -> Result<String, EftError> {
    let document = ScalingDocument {
        terms: model
            .terms()
            .iter()
            .map(|t| {
                (
                    t.params().to_vec(),
                    t.values().to_vec(),
                    t.uncertainties().to_vec(),
                )
            })
            .collect(),
        nbins: model.nbins(),
        sm_vals: model.nominal().to_vec(),
        bin_edges: model.edges().clone(),
        bin_labels: model.labels().map(<[String]>::to_vec),
        parameters: model.parameter_names(),
    };
    serde_json::to_string_pretty(&document).map_err(|err| serde_error("model-serialize", err))
}

/// Restores a model from the scaling-model document.
pub fn model_from_json(data: &str) -> Result<ScalingModel, EftError> {
    let document: ScalingDocument =
        serde_json::from_str(data).map_err(|err| serde_error("model-deserialize", err))?;
    let terms = document
        .terms
        .into_iter()
        .map(|(params, values, uncertainties)| EftTerm::new(params, values, uncertainties))
        .collect::<Result<Vec<_>, _>>()?;
    ScalingModel::new(
        document.nbins,
        document.bin_edges,
        document.bin_labels,
        document.sm_vals,
        terms,
    )
}

/// Writes a model document to `path`.
pub fn write_model(path: &Path, model: &ScalingModel) -> Result<(), EftError> {
    write_file(path, "model-write", &model_to_json(model)?)
}

/// Reads a model document from `path`.
pub fn read_model(path: &Path) -> Result<ScalingModel, EftError> {
    model_from_json(&read_file(path, "model-read")?)
}

/// On-disk shape of accumulated statistics.
#[derive(Debug, Serialize, Deserialize)]
struct StatsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terms: Option<Vec<Vec<String>>>,
    /// Older writers stored the parameter list instead of the term list.
    #[serde(default, skip_serializing)]
    params: Option<Vec<String>>,
    #[serde(rename = "sumW")]
    sum_w: Vec<Vec<f64>>,
    #[serde(rename = "sumW2")]
    sum_w2: Vec<Vec<f64>>,
    #[serde(rename = "numEntries", deserialize_with = "entry_counts")]
    num_entries: Vec<Vec<u64>>,
    #[serde(default)]
    bin_edges: BinEdges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bin_labels: Option<Vec<String>>,
}

/// Accepts counts written either as integers or as integral floats.
fn entry_counts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u64>>, D::Error> {
    let rows = Vec::<Vec<f64>>::deserialize(deserializer)?;
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|value| {
                    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
                        Ok(value as u64)
                    } else {
                        Err(D::Error::custom(format!(
                            "numEntries value {value} is not a non-negative integer"
                        )))
                    }
                })
                .collect()
        })
        .collect()
}

/// Serializes accumulated statistics together with the grid defining their rows.
pub fn stats_to_json(acc: &BinAccumulator, grid: &SampleGrid) -> Result<String, EftError> {
    if acc.n_points() != grid.len() {
        return Err(EftError::shape("stats-shape", "terms", acc.n_points(), grid.len()));
    }
    let (sum_w, sum_w2, num_entries) = acc.to_nested();
    let document = StatsDocument {
        terms: Some(grid.terms()),
        params: None,
        sum_w,
        sum_w2,
        num_entries,
        bin_edges: acc.edges().clone(),
        bin_labels: acc.labels().map(<[String]>::to_vec),
    };
    serde_json::to_string_pretty(&document).map_err(|err| serde_error("stats-serialize", err))
}

/// Restores accumulated statistics and their grid.
pub fn stats_from_json(data: &str) -> Result<(SampleGrid, BinAccumulator), EftError> {
    let document: StatsDocument =
        serde_json::from_str(data).map_err(|err| serde_error("stats-deserialize", err))?;
    let grid = match (&document.terms, &document.params) {
        (Some(terms), _) => SampleGrid::from_terms(terms)?,
        (None, Some(params)) => SampleGrid::build(params)?,
        (None, None) => {
            return Err(EftError::InvalidConfiguration(
                ErrorInfo::new("missing-field", "statistics document lists no terms")
                    .with_context("field", "terms")
                    .with_hint("older documents may carry a params list instead"),
            ))
        }
    };
    if document.sum_w.len() != grid.len() {
        return Err(EftError::shape(
            "stats-shape",
            "sumW",
            grid.len(),
            document.sum_w.len(),
        ));
    }
    let acc = BinAccumulator::from_parts(document.sum_w, document.sum_w2, document.num_entries)?
        .with_binning(document.bin_edges, document.bin_labels)?;
    Ok((grid, acc))
}

/// Writes a statistics document to `path`.
pub fn write_stats(path: &Path, acc: &BinAccumulator, grid: &SampleGrid) -> Result<(), EftError> {
    write_file(path, "stats-write", &stats_to_json(acc, grid)?)
}

/// Reads a statistics document from `path`.
pub fn read_stats(path: &Path) -> Result<(SampleGrid, BinAccumulator), EftError> {
    stats_from_json(&read_file(path, "stats-read")?)
}
