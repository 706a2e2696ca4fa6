//! Allowed-value lists referenced by the extraction prompt.
//!
//! Each list comes from a CSV file with a header row. Only the first column
//! is read; empty cells are skipped and repeated values keep their first
//! position.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::info;

use sismica_core::{Error, ReferencePaths, Result};

/// Ordered, deduplicated list of allowed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceList {
    values: Vec<String>,
}

impl ReferenceList {
    /// Build from values in order, dropping empties and later duplicates.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let values = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| !v.is_empty())
            .filter(|v| seen.insert(v.clone()))
            .collect();
        Self { values }
    }

    /// Parse CSV content (header row, first column).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut values = Vec::new();
        for record in csv.records() {
            let record = record?;
            if let Some(first) = record.get(0) {
                values.push(first.to_string());
            }
        }
        Ok(Self::from_values(values))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Config(format!("Cannot open {}: {}", path.display(), e)))?;
        Self::from_reader(file)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bracketed, comma-separated literal of quoted entries: `['A', 'B']`.
    ///
    /// Entries are single-quoted, or double-quoted when they contain a
    /// single quote and no double quote. Entries are never escaped.
    pub fn to_sequence_literal(&self) -> String {
        let items: Vec<String> = self
            .values
            .iter()
            .map(|v| {
                if v.contains('\'') && !v.contains('"') {
                    format!("\"{}\"", v)
                } else {
                    format!("'{}'", v)
                }
            })
            .collect();
        format!("[{}]", items.join(", "))
    }
}

/// The three lists the prompt is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceLists {
    pub contractors: ReferenceList,
    pub operators: ReferenceList,
    pub processing_types: ReferenceList,
}

impl ReferenceLists {
    /// Load all three lists. Any missing or unreadable file is an error.
    pub fn load(paths: &ReferencePaths) -> Result<Self> {
        let lists = Self {
            contractors: ReferenceList::from_path(&paths.contractors)?,
            operators: ReferenceList::from_path(&paths.operators)?,
            processing_types: ReferenceList::from_path(&paths.processing_types)?,
        };
        info!(
            subsystem = "inference",
            component = "reference",
            op = "load",
            contractors = lists.contractors.len(),
            operators = lists.operators.len(),
            processing_types = lists.processing_types.len(),
            "Reference lists loaded"
        );
        Ok(lists)
    }
}
