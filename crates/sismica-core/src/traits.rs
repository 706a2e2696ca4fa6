//! Backend traits for sismica.
//!
//! Each external service sits behind one of these traits so the pipeline can
//! run against Google Cloud, local backends, or in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, EnqueuedTask};
use crate::warehouse::{Row, TableRef, TableSchema, TableStatus};

// =============================================================================
// STORAGE
// =============================================================================

/// Object storage holding the scanned documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a whole object into memory with its declared content type.
    ///
    /// A missing object is `Error::NotFound`; other backend failures surface
    /// as-is. No retry, no size limit.
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Document>;

    /// List every object name under `prefix`, in backend listing order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Multimodal generative model that reads a document under a prompt.
#[async_trait]
pub trait DocumentModel: Send + Sync {
    /// Send the document followed by the prompt and return the response text,
    /// trimmed of surrounding whitespace.
    async fn generate_from_document(
        &self,
        document: &Document,
        prompt: &str,
        model_version: &str,
    ) -> Result<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// WAREHOUSE
// =============================================================================

/// Tabular warehouse holding results and metrics.
///
/// The operations mirror the access pattern of the sinks: lookup-or-create,
/// existence check, update, append, and a single-statement upsert.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Look up a table. Absence is `Ok(TableStatus::Absent)`; permission or
    /// transport failures are errors.
    async fn table_status(&self, table: &TableRef) -> Result<TableStatus>;

    /// Create a table. Creating a table that already exists is not an error.
    async fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()>;

    /// Count rows whose `column` equals `value`.
    async fn count_rows(&self, table: &TableRef, column: &str, value: &str) -> Result<u64>;

    /// Set `assignments` on every row whose `key_column` equals `key`.
    /// Returns the number of affected rows.
    async fn update_rows(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        assignments: &Row,
    ) -> Result<u64>;

    /// Append rows unconditionally.
    async fn insert_rows(&self, table: &TableRef, rows: &[Row]) -> Result<()>;

    /// Insert `row`, or update the row with the same `key_column` value, in a
    /// single statement.
    async fn merge_row(&self, table: &TableRef, key_column: &str, row: &Row) -> Result<()>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// TASK QUEUE
// =============================================================================

/// Managed queue delivering one HTTP call per task to the worker endpoint.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue one task. Returns the backend's task name.
    async fn enqueue(&self, task: &EnqueuedTask) -> Result<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}
