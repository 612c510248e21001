pub mod demo;
pub mod evaluate;
pub mod export;
pub mod merge;
pub mod points;
pub mod solve;

use std::error::Error;
use std::fs;
use std::path::Path;

use eft_core::{EftError, ErrorInfo, Parameter, ParameterConfig};
use eft_scale::SampleGrid;

/// Reads a parameter-configuration document.
pub fn load_config(path: &Path) -> Result<ParameterConfig, Box<dyn Error>> {
    let json = fs::read_to_string(path)?;
    Ok(ParameterConfig::from_json(&json)?)
}

/// Looks up every grid parameter in `config`, in grid order.
pub fn grid_parameters(
    config: &ParameterConfig,
    grid: &SampleGrid,
) -> Result<Vec<Parameter>, EftError> {
    grid.names()
        .iter()
        .map(|name| {
            config.parameter(name).cloned().ok_or_else(|| {
                EftError::InvalidConfiguration(
                    ErrorInfo::new("missing-parameter", "grid parameter absent from the configuration")
                        .with_context("field", "parameters")
                        .with_context("parameter", name),
                )
            })
        })
        .collect()
}

/// Parses `name=value`.
pub fn parse_assignment(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in {raw}"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value in {raw}: {err}"))?;
    Ok((name.to_string(), value))
}

/// Parses a comma separated term selector such as `cG,c2G`.
pub fn parse_selector(raw: &str) -> Result<Vec<String>, String> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() || names.len() > 2 {
        return Err(format!("a selector names one or two parameters, got {raw}"));
    }
    Ok(names)
}

/// Writes `contents` to `out`, or prints them when no path is given.
pub fn emit(out: Option<&Path>, contents: &str) -> Result<(), Box<dyn Error>> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        None => println!("{contents}"),
    }
    Ok(())
}
