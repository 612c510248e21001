//! Parameter configuration documents produced by the generator setup step.
//!
//! A configuration lists the Wilson coefficients that are probed, together with
//! `parameter_defaults` that are merged into every entry missing a field. The
//! merged form is what the rest of the engine consumes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::{EftError, ErrorInfo};

fn config_error(code: &str, field: &str, message: impl Into<String>) -> EftError {
    EftError::invalid(code, field, message)
}

/// Offset along a single parameter axis at which a sample point is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOffset {
    /// Parameter held at its SM value.
    Baseline,
    /// Parameter moved half way from the SM value to the sampling value.
    Half,
    /// Parameter moved to its sampling value.
    Full,
}

/// Fully merged description of a single coupling parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Unique parameter name.
    pub name: String,
    /// Index of the parameter inside its block.
    pub index: u32,
    /// Parameter-card block holding the parameter.
    pub block: String,
    /// Sampling value; the full step is `val - sm`.
    pub val: f64,
    /// SM (inactive) value used as the baseline.
    pub sm: f64,
    /// Value used when generating the nominal sample.
    pub gen: f64,
}

impl Parameter {
    /// Creates a parameter with `sm = gen = 0`.
    pub fn new(name: impl Into<String>, val: f64) -> Self {
        Self {
            name: name.into(),
            index: 0,
            block: String::new(),
            val,
            sm: 0.0,
            gen: 0.0,
        }
    }

    /// Finite-differencing step between the baseline and the full sample.
    pub fn step(&self) -> f64 {
        self.val - self.sm
    }

    /// Value of this parameter at the requested offset.
    pub fn sample_value(&self, offset: SampleOffset) -> f64 {
        match offset {
            SampleOffset::Baseline => self.sm,
            SampleOffset::Half => (self.val + self.sm) / 2.0,
            SampleOffset::Full => self.val,
        }
    }
}

/// Parameter that is held fixed at a non-SM value and never probed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InactiveParameter {
    /// Parameter-card block.
    pub block: String,
    /// Parameter name.
    pub name: String,
    /// Index of the parameter inside its block.
    pub index: u32,
    /// Fixed value.
    pub val: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawParameter {
    name: Option<String>,
    index: Option<u32>,
    block: Option<String>,
    val: Option<f64>,
    sm: Option<f64>,
    gen: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawDefaults {
    block: Option<String>,
    val: Option<f64>,
    sm: Option<f64>,
    gen: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawInactive {
    #[serde(default)]
    default_val: f64,
    #[serde(default)]
    parameters: Vec<InactiveParameter>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    parameters: Vec<RawParameter>,
    #[serde(default)]
    parameter_defaults: RawDefaults,
    #[serde(default)]
    blocks: Vec<String>,
    #[serde(default)]
    inactive: RawInactive,
}

/// Merged parameter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    parameters: Vec<Parameter>,
    blocks: Vec<String>,
    inactive_default: f64,
    inactive: Vec<InactiveParameter>,
}

impl ParameterConfig {
    /// Builds a configuration from already merged parameters.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, EftError> {
        let mut seen = BTreeSet::new();
        let mut blocks = Vec::new();
        for param in &parameters {
            validate_parameter(param)?;
            if !seen.insert(param.name.as_str()) {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("duplicate-parameter", "parameter names must be unique")
                        .with_context("field", "parameters")
                        .with_context("parameter", &param.name),
                ));
            }
            if !param.block.is_empty() && !blocks.contains(&param.block) {
                blocks.push(param.block.clone());
            }
        }
        Ok(Self {
            parameters,
            blocks,
            inactive_default: 0.0,
            inactive: Vec::new(),
        })
    }

    /// Parses a configuration document and merges `parameter_defaults`.
    pub fn from_json(json: &str) -> Result<Self, EftError> {
        let raw: RawConfig = serde_json::from_str(json).map_err(|err| {
            EftError::InvalidConfiguration(
                ErrorInfo::new("config-parse", err.to_string()).with_context("field", "parameters"),
            )
        })?;
        let defaults = raw.parameter_defaults;
        let mut parameters = Vec::with_capacity(raw.parameters.len());
        for (position, entry) in raw.parameters.into_iter().enumerate() {
            parameters.push(merge_entry(position, entry, &defaults)?);
        }
        let mut config = Self::new(parameters)?;
        if !raw.blocks.is_empty() {
            config.blocks = raw.blocks;
        }
        config.inactive_default = raw.inactive.default_val;
        config.inactive = raw.inactive.parameters;
        Ok(config)
    }

    /// Merged parameters in document order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameter names in document order.
    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Finite-differencing steps in document order.
    pub fn steps(&self) -> Vec<f64> {
        self.parameters.iter().map(Parameter::step).collect()
    }

    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter-card blocks touched by the configuration.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Parameters held fixed away from the SM during generation.
    pub fn inactive(&self) -> &[InactiveParameter] {
        &self.inactive
    }

    /// Value given to inactive parameters that are not listed explicitly.
    pub fn inactive_default(&self) -> f64 {
        self.inactive_default
    }
}

fn merge_entry(
    position: usize,
    entry: RawParameter,
    defaults: &RawDefaults,
) -> Result<Parameter, EftError> {
    let missing = |field: &str| {
        EftError::InvalidConfiguration(
            ErrorInfo::new(
                "missing-field",
                format!("parameter {position} has no `{field}` and no default"),
            )
            .with_context("field", field)
            .with_context("position", position),
        )
    };
    let name = entry.name.ok_or_else(|| missing("name"))?;
    let index = entry.index.ok_or_else(|| missing("index"))?;
    let block = entry
        .block
        .or_else(|| defaults.block.clone())
        .ok_or_else(|| missing("block"))?;
    let val = entry.val.or(defaults.val).ok_or_else(|| missing("val"))?;
    let sm = entry.sm.or(defaults.sm).unwrap_or(0.0);
    let gen = entry.gen.or(defaults.gen).unwrap_or(0.0);
    Ok(Parameter {
        name,
        index,
        block,
        val,
        sm,
        gen,
    })
}

fn validate_parameter(param: &Parameter) -> Result<(), EftError> {
    if param.name.trim().is_empty() {
        return Err(config_error(
            "empty-parameter-name",
            "name",
            "parameter names must be non-empty",
        ));
    }
    let step = param.step();
    if !step.is_finite() || step == 0.0 {
        return Err(EftError::InvalidConfiguration(
            ErrorInfo::new("zero-step", "sampling value must differ from the SM value")
                .with_context("field", "val")
                .with_context("parameter", &param.name),
        ));
    }
    Ok(())
}
