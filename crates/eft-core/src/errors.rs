//! Structured error types shared across the EFT scaling crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`EftError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (field names, cardinalities, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the EFT scaling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum EftError {
    /// Duplicate or missing parameter names and malformed document fields.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(ErrorInfo),
    /// Arrays whose bin or sample point counts disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(ErrorInfo),
    /// Encoding and decoding failures.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem failures while reading or writing documents.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl EftError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            EftError::InvalidConfiguration(info)
            | EftError::ShapeMismatch(info)
            | EftError::Serde(info)
            | EftError::Io(info) => info,
        }
    }

    /// Builds an [`EftError::InvalidConfiguration`] naming the offending field.
    pub fn invalid(code: &str, field: &str, message: impl Into<String>) -> Self {
        EftError::InvalidConfiguration(ErrorInfo::new(code, message).with_context("field", field))
    }

    /// Builds an [`EftError::ShapeMismatch`] carrying expected and actual cardinality.
    pub fn shape(code: &str, field: &str, expected: usize, actual: usize) -> Self {
        EftError::ShapeMismatch(
            ErrorInfo::new(
                code,
                format!("{field} has {actual} entries, expected {expected}"),
            )
            .with_context("field", field)
            .with_context("expected", expected)
            .with_context("actual", actual),
        )
    }
}
