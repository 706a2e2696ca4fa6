//! # sismica-store
//!
//! Storage layer for the sismica extraction service.
//!
//! This crate provides:
//! - Document stores (GCS, local filesystem) behind [`DocumentStore`]
//! - Warehouse backends (BigQuery, PostgreSQL) behind [`Warehouse`]
//! - The result sink (upsert by path) and the metrics sink (append-only)
//!
//! ## Example
//!
//! ```rust,ignore
//! use sismica_store::{build_warehouse, ResultStore};
//!
//! let config = ServiceConfig::from_env()?;
//! let warehouse = build_warehouse(&config, auth.clone()).await?;
//! let results = ResultStore::new(
//!     warehouse,
//!     config.results_table_ref(),
//!     config.upsert_strategy,
//!     config.variant,
//! );
//! results.upsert("lineas/l-01.pdf", "{\"codigo\": \"L-01\"}").await?;
//! ```

pub mod documents;
pub mod metrics;
pub mod pool;
pub mod results;
pub mod warehouse;

use std::sync::Arc;

use tracing::info;

pub use documents::{
    detect_content_type, FilesystemDocumentStore, GcsConfig, GcsDocumentStore,
};
#[cfg(any(test, feature = "mock"))]
pub use documents::MemoryDocumentStore;
pub use metrics::{metrics_schema, MetricsStore};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use results::{results_schema, ResultStore};
#[cfg(any(test, feature = "mock"))]
pub use warehouse::MemoryWarehouse;
pub use warehouse::{ensure_table, BigQueryConfig, BigQueryWarehouse, PostgresWarehouse};

// Re-export core types
pub use sismica_core::*;

/// Document store selected by `STORAGE_BACKEND`.
pub fn build_document_store(
    config: &ServiceConfig,
    auth: Arc<dyn TokenProvider>,
) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match &config.storage {
        StorageBackendKind::Gcs => Arc::new(GcsDocumentStore::new(
            GcsConfig::from_endpoints(&config.endpoints),
            auth,
        )?),
        StorageBackendKind::Filesystem { root } => {
            Arc::new(FilesystemDocumentStore::new(root.clone()))
        }
    };
    info!(
        subsystem = "store",
        component = store.name(),
        op = "init",
        "Document store ready"
    );
    Ok(store)
}

/// Warehouse selected by `WAREHOUSE_BACKEND`. PostgreSQL connects eagerly.
pub async fn build_warehouse(
    config: &ServiceConfig,
    auth: Arc<dyn TokenProvider>,
) -> Result<Arc<dyn Warehouse>> {
    let warehouse: Arc<dyn Warehouse> = match &config.warehouse {
        WarehouseBackendKind::BigQuery => {
            Arc::new(BigQueryWarehouse::new(
                BigQueryConfig::from_endpoints(&config.endpoints),
                auth,
            )?)
        }
        WarehouseBackendKind::Postgres { database_url } => {
            Arc::new(PostgresWarehouse::new(create_pool(database_url).await?))
        }
    };
    info!(
        subsystem = "store",
        component = warehouse.name(),
        op = "init",
        dataset = %config.dataset,
        "Warehouse ready"
    );
    Ok(warehouse)
}
