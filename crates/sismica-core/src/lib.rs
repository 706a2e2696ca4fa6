//! # sismica-core
//!
//! Core types, traits, and configuration for the sismica document
//! extraction service.
//!
//! This crate provides the data model, the backend traits that the storage,
//! inference and job crates implement, the service configuration, and the
//! Google Cloud credential providers shared by every HTTP client.

pub mod config;
pub mod defaults;
pub mod error;
pub mod gcp_auth;
pub mod logging;
pub mod models;
pub mod traits;
pub mod warehouse;

// Re-export commonly used types at crate root
pub use config::{
    EndpointConfig, QueueConfig, ReferencePaths, ServiceConfig, StorageBackendKind,
    WarehouseBackendKind,
};
pub use error::{Error, Result};
pub use gcp_auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use models::*;
pub use traits::*;
pub use warehouse::{CellValue, ColumnDef, ColumnType, Row, TableRef, TableSchema, TableStatus};
