//! Report and legacy renderings of a [`ScalingModel`].
//!
//! Every format is rendered from the same model. Name translations only
//! affect the human-facing formats (`text`, `table`, `latex`).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use eft_core::errors::{EftError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::accumulator::BinAccumulator;
use crate::grid::SampleGrid;
use crate::model::{BinEdges, EftTerm, ScalingModel, TermKind};
use crate::serde::model_to_json;

const DIVIDER_WIDTH: usize = 65;

/// Name replacements applied by the textual exporters.
pub type Translations = BTreeMap<String, String>;

/// Output shape of [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Scaling-model document.
    Json,
    /// Flattened per-bin document for older consumers.
    ///
    /// Its `parameters` list holds the names present in the model, sorted,
    /// rather than the configuration order, which the model does not keep.
    Legacy,
    /// One line per bin.
    Text,
    /// Fixed-width per-bin table.
    Table,
    /// LaTeX `tabular` block.
    Latex,
}

impl ExportFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json | ExportFormat::Legacy => "json",
            ExportFormat::Text | ExportFormat::Table => "txt",
            ExportFormat::Latex => "tex",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EftError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(ExportFormat::Json),
            "legacy" => Ok(ExportFormat::Legacy),
            "text" | "txt" => Ok(ExportFormat::Text),
            "table" => Ok(ExportFormat::Table),
            "latex" | "tex" => Ok(ExportFormat::Latex),
            other => Err(EftError::InvalidConfiguration(
                ErrorInfo::new("export-format", format!("unknown export format {other}"))
                    .with_context("field", "format")
                    .with_hint("expected one of json, legacy, text, table, latex"),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct LegacyDocument {
    edges: Vec<f64>,
    areas: Vec<f64>,
    parameters: Vec<String>,
    bins: Vec<Vec<Vec<serde_json::Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bin_labels: Option<Vec<String>>,
}

/// Renders `model` in the requested format.
pub fn export(
    model: &ScalingModel,
    format: ExportFormat,
    translations: &Translations,
) -> Result<String, EftError> {
    match format {
        ExportFormat::Json => model_to_json(model),
        ExportFormat::Legacy => legacy(model),
        ExportFormat::Text => Ok(text(model, translations)),
        ExportFormat::Table => Ok(table(model, translations)),
        ExportFormat::Latex => Ok(latex(model, translations)),
    }
}

/// Renders `model` and writes it to `path`.
pub fn write_export(
    path: &Path,
    model: &ScalingModel,
    format: ExportFormat,
    translations: &Translations,
) -> Result<(), EftError> {
    let rendered = export(model, format, translations)?;
    fs::write(path, rendered).map_err(|err| {
        EftError::Io(
            ErrorInfo::new("export-write", err.to_string())
                .with_context("path", path.display()),
        )
    })
}

fn translate<'a>(name: &'a str, translations: &'a Translations) -> &'a str {
    translations.get(name).map(String::as_str).unwrap_or(name)
}

/// Terms with a non-zero coefficient in `bin`.
fn active_terms(model: &ScalingModel, bin: usize) -> impl Iterator<Item = &EftTerm> {
    model
        .terms()
        .iter()
        .filter(move |t| t.kind() != TermKind::Constant && t.values()[bin] != 0.0)
}

/// `parameters` lists the model's names sorted; names whose terms were pruned are absent.
fn legacy(model: &ScalingModel) -> Result<String, EftError> {
    let bins = (0..model.nbins())
        .map(|bin| {
            active_terms(model, bin)
                .map(|t| {
                    let mut row: Vec<serde_json::Value> =
                        vec![t.values()[bin].into(), t.uncertainties()[bin].into()];
                    row.extend(t.params().iter().map(|p| p.clone().into()));
                    row
                })
                .collect()
        })
        .collect();
    let ranges = model.edges().unrolled();
    let mut edges: Vec<f64> = ranges.iter().map(|[lo, _]| *lo).collect();
    edges.extend(ranges.last().map(|[_, hi]| *hi));
    let document = LegacyDocument {
        edges,
        areas: model.nominal().to_vec(),
        parameters: model.parameter_names(),
        bins,
        bin_labels: model.labels().map(<[String]>::to_vec),
    };
    serde_json::to_string_pretty(&document)
        .map_err(|err| EftError::Serde(ErrorInfo::new("legacy-serialize", err.to_string())))
}

/// Bin range as `lo-hi` (1-D) or `xlo-xhi,ylo-yhi` (2-D); the bin number when edges are unknown.
fn plain_range(edges: &BinEdges, bin: usize) -> String {
    match edges {
        BinEdges::OneD(e) if bin < e.len() => format!("{}-{}", fmt_g(e[bin][0]), fmt_g(e[bin][1])),
        BinEdges::TwoD(e) if bin < e.len() => {
            let [x, y] = e[bin];
            format!(
                "{}-{},{}-{}",
                fmt_g(x[0]),
                fmt_g(x[1]),
                fmt_g(y[0]),
                fmt_g(y[1])
            )
        }
        _ => bin.to_string(),
    }
}

fn math_range(edges: &BinEdges, bin: usize) -> String {
    match edges {
        BinEdges::OneD(e) if bin < e.len() => {
            format!("${}$--${}$", fmt_g(e[bin][0]), fmt_g(e[bin][1]))
        }
        BinEdges::TwoD(e) if bin < e.len() => {
            let [x, y] = e[bin];
            format!(
                "${}$--${}$, ${}$--${}$",
                fmt_g(x[0]),
                fmt_g(x[1]),
                fmt_g(y[0]),
                fmt_g(y[1])
            )
        }
        _ => format!("${bin}$"),
    }
}

fn text(model: &ScalingModel, translations: &Translations) -> String {
    let lines: Vec<String> = (0..model.nbins())
        .map(|bin| {
            let mut line = format!("{}:1", plain_range(model.edges(), bin));
            for term in active_terms(model, bin) {
                let _ = write!(line, " + {:.3}", term.values()[bin]);
                for name in term.params() {
                    let _ = write!(line, " * {}", translate(name, translations));
                }
            }
            line
        })
        .collect();
    lines.join("\n")
}

fn table(model: &ScalingModel, translations: &Translations) -> String {
    let divider = "-".repeat(DIVIDER_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{divider}");
    for bin in 0..model.nbins() {
        let _ = writeln!(
            out,
            "Bin {:<4} sm: {:<10}",
            bin,
            fmt_g_prec(model.nominal()[bin], 3)
        );
        let mut edges = format!("         edges: {}", plain_range(model.edges(), bin));
        if let Some(labels) = model.labels() {
            let _ = write!(edges, ", label={}", labels[bin]);
        }
        let _ = writeln!(out, "{edges}");
        let _ = writeln!(out, "{divider}");
        let _ = writeln!(
            out,
            "{:<20} | {:>12} | {:>12} | {:>12}",
            "Term", "Val", "Uncert", "Rel. uncert."
        );
        let _ = writeln!(out, "{divider}");
        for term in model.terms() {
            let label: Vec<&str> = term
                .params()
                .iter()
                .map(|name| translate(name, translations))
                .collect();
            let _ = writeln!(
                out,
                "{}",
                table_row(&label.join(" * "), term.values()[bin], term.uncertainties()[bin])
            );
        }
        let _ = writeln!(out, "{divider}");
    }
    out
}

fn table_row(label: &str, value: f64, uncertainty: f64) -> String {
    let relative = if value != 0.0 { uncertainty / value } else { 0.0 };
    format!(
        "{:<20} | {:>12.4} | {:>12.4} | {:>12.4}",
        label,
        value,
        uncertainty,
        relative.abs()
    )
}

fn latex(model: &ScalingModel, translations: &Translations) -> String {
    let mut lines = vec![
        "\\begin{table}[htb]".to_string(),
        "    \\centering".to_string(),
        "    \\setlength\\tabcolsep{10pt}".to_string(),
        "    \\begin{tabular}{|c|c|}".to_string(),
        "        \\hline".to_string(),
    ];
    for bin in 0..model.nbins() {
        let mut line = format!(
            "{} & \\parbox{{0.8\\columnwidth}}{{$1 ",
            math_range(model.edges(), bin)
        );
        for term in active_terms(model, bin) {
            let factors = match term.kind() {
                TermKind::Quadratic => format!("{{{}}}^{{2}}", translate(&term.params()[0], translations)),
                _ => term
                    .params()
                    .iter()
                    .map(|name| translate(name, translations))
                    .collect::<Vec<_>>()
                    .join("\\,"),
            };
            let _ = write!(line, " + {:.1}\\,{}", term.values()[bin], factors);
        }
        line.push_str("$} \\\\");
        lines.push(line);
        lines.push("\\hline".to_string());
    }
    lines.push("\\end{tabular}".to_string());
    lines.push("    \\end{table}".to_string());
    lines.join("\n")
}

/// Per-bin statistics table of a raw accumulator.
///
/// Rows follow [`SampleGrid::ordered_entries`]. With `relative`, values are
/// divided by the reference mean (zero where it is not positive). With
/// `skip_empty`, bins without reference entries only print their header.
pub fn render_accumulator_table(
    acc: &BinAccumulator,
    grid: &SampleGrid,
    relative: bool,
    skip_empty: bool,
) -> Result<String, EftError> {
    if acc.n_points() != grid.len() {
        return Err(EftError::shape(
            "grid-shape",
            "samplePoints",
            acc.n_points(),
            grid.len(),
        ));
    }
    let stats = acc.bin_statistics();
    let divider = "-".repeat(DIVIDER_WIDTH);
    let reference_entries = acc.num_entries(0);
    let mut out = String::new();
    let _ = writeln!(out, "{divider}");
    for bin in 0..acc.n_bins() {
        let reference = stats.mean[0][bin];
        let _ = writeln!(
            out,
            "Bin {:<4} numEntries: {:<10} mean: {:<10} stderr: {:<10}",
            bin,
            reference_entries[bin],
            fmt_g_prec(reference, 3),
            fmt_g_prec(stats.std_err[0][bin], 3)
        );
        let mut edges = format!("         edges: {}", plain_range(acc.edges(), bin));
        if let Some(labels) = acc.labels() {
            let _ = write!(edges, ", label={}", labels[bin]);
        }
        let _ = writeln!(out, "{edges}");
        let _ = writeln!(out, "{divider}");
        if skip_empty && reference_entries[bin] == 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "{:<20} | {:>12} | {:>12} | {:>12}",
            "Term", "Val", "Uncert", "Rel. uncert."
        );
        let _ = writeln!(out, "{divider}");
        for index in grid.ordered_entries() {
            let (mut value, mut uncertainty) = (stats.mean[index][bin], stats.std_err[index][bin]);
            if relative {
                if reference > 0.0 {
                    value /= reference;
                    uncertainty /= reference;
                } else {
                    value = 0.0;
                    uncertainty = 0.0;
                }
            }
            let label = grid.points()[index].label();
            let _ = writeln!(out, "{}", table_row(&label, value, uncertainty));
        }
        let _ = writeln!(out, "{divider}");
    }
    Ok(out)
}

/// Shortest `%g` rendering with six significant digits.
pub fn fmt_g(value: f64) -> String {
    fmt_g_prec(value, 6)
}

/// C-style `%.{precision}g` rendering.
pub fn fmt_g_prec(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (scientific.clone(), 0),
    };
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_zeros(&mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, value))
    }
}

fn strip_zeros(number: &str) -> String {
    if number.contains('.') {
        number
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        number.to_string()
    }
}
