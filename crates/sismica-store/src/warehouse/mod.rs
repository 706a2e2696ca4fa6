//! Warehouse backends for the results and metrics tables.
//!
//! - [`BigQueryWarehouse`]: BigQuery REST API (tables, jobs.query, insertAll)
//! - [`PostgresWarehouse`]: PostgreSQL via sqlx, dataset mapped to a schema
//! - [`MemoryWarehouse`] (feature `mock`): in-memory, for tests

mod bigquery;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod postgres;

pub use bigquery::{BigQueryConfig, BigQueryWarehouse};
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryWarehouse;
pub use postgres::PostgresWarehouse;

use tracing::info;

use sismica_core::{Error, Result, TableRef, TableSchema, TableStatus, Warehouse};

/// Create `table` if the lookup reports it absent.
///
/// Lookup failures other than absence propagate, so a permission error is
/// never mistaken for a missing table.
pub async fn ensure_table(
    warehouse: &dyn Warehouse,
    table: &TableRef,
    schema: &TableSchema,
) -> Result<()> {
    match warehouse.table_status(table).await? {
        TableStatus::Present => Ok(()),
        TableStatus::Absent => {
            info!(
                subsystem = "store",
                component = warehouse.name(),
                op = "create_table",
                db_table = %table,
                "Creating missing table"
            );
            warehouse.create_table(table, schema).await
        }
    }
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Table and column names are interpolated into SQL text, so they are
/// checked before any statement is built.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!("Invalid identifier: {:?}", name)))
    }
}

/// Project ids may also contain `-`, `.` and `:` (domain-scoped projects).
pub(crate) fn validate_project(project: &str) -> Result<&str> {
    let valid = !project.is_empty()
        && project
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if valid {
        Ok(project)
    } else {
        Err(Error::InvalidInput(format!("Invalid project id: {:?}", project)))
    }
}

pub(crate) fn validate_table(table: &TableRef) -> Result<()> {
    validate_project(&table.project)?;
    validate_identifier(&table.dataset)?;
    validate_identifier(&table.table)?;
    Ok(())
}
