//! Read-only lookup from PDG identifiers to particle names.
//!
//! The table is loaded once from a two column CSV (`pdg_id,name`) and passed
//! explicitly to whatever needs it; nothing is cached process-wide.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::errors::{EftError, ErrorInfo};

fn table_error(code: &str, message: impl Into<String>) -> EftError {
    EftError::InvalidConfiguration(ErrorInfo::new(code, message).with_context("field", "pdg_id"))
}

/// Immutable PDG id to name table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticleTable {
    names: BTreeMap<i64, String>,
}

impl ParticleTable {
    /// Parses a table from any CSV source. Lines starting with `#` are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EftError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut names = BTreeMap::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|err| table_error("particle-csv", err.to_string()))?;
            let (Some(id), Some(name)) = (record.get(0), record.get(1)) else {
                return Err(table_error(
                    "particle-row",
                    format!("row {line} needs an id and a name"),
                ));
            };
            let id: i64 = id.parse().map_err(|_| {
                table_error("particle-id", format!("row {line} has non-integer id `{id}`"))
            })?;
            names.insert(id, name.to_string());
        }
        log::debug!("loaded {} particle names", names.len());
        Ok(Self { names })
    }

    /// Loads a table from a CSV file on disk.
    pub fn load(path: &Path) -> Result<Self, EftError> {
        let file = File::open(path).map_err(|err| {
            EftError::Io(
                ErrorInfo::new("particle-open", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_reader(file)
    }

    /// Name registered for `id`.
    pub fn name(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Name registered for `id`, or the id itself when unknown.
    pub fn display_name(&self, id: i64) -> String {
        self.name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of registered particles.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
