//! Backend-neutral description of warehouse tables and rows.

use std::fmt;

use chrono::{DateTime, Utc};

/// Fully qualified table: project, dataset (schema on PostgreSQL), table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Column types used by the results and metrics tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Timestamp,
    Float,
}

impl ColumnType {
    /// BigQuery standard SQL type name.
    pub fn bigquery_name(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Timestamp => "TIMESTAMP",
            Self::Float => "FLOAT",
        }
    }

    /// PostgreSQL type name.
    pub fn postgres_name(&self) -> &'static str {
        match self {
            Self::String => "TEXT",
            Self::Timestamp => "TIMESTAMPTZ",
            Self::Float => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }
}

/// Columns plus the optional upsert key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
    /// Column that identifies a row for upserts. Backends that enforce
    /// uniqueness declare it unique.
    pub key: Option<&'static str>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Outcome of a table lookup. Any other lookup failure is an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Present,
    Absent,
}

/// A single typed value bound into a row or statement.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Timestamp(DateTime<Utc>),
    Float(f64),
    Null,
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form used by streaming inserts.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Self::Float(v) => serde_json::json!(v),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Option<String>> for CellValue {
    fn from(v: Option<String>) -> Self {
        v.map(Self::String).unwrap_or(Self::Null)
    }
}

/// Ordered column/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing an existing value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Row without the given column (used to build update assignments).
    pub fn without(&self, column: &str) -> Row {
        Row {
            cells: self
                .cells
                .iter()
                .filter(|(c, _)| c != column)
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// JSON object form used by streaming inserts.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .cells
            .iter()
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}
