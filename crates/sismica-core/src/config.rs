//! Service configuration.
//!
//! Everything that used to be a process-wide constant (project, region,
//! queue, worker URL, tables) lives in one [`ServiceConfig`] that `main`
//! builds once and hands to each component's constructor.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HOST` / `PORT` | `0.0.0.0` / `8080` |
//! | `GCP_PROJECT` | `extrac-datos-geosys-production` |
//! | `GCP_REGION` | `us-central1` |
//! | `CLOUD_TASK_QUEUE` | `online-sismica` |
//! | `WORKER_URL` | unset (dispatch disabled) |
//! | `TASK_SERVICE_ACCOUNT` | unset |
//! | `DEFAULT_MODEL_VERSION` | `gemini-2.5-flash` |
//! | `PIPELINE_VARIANT` | `full` |
//! | `STORAGE_BACKEND` | `gcs` (`filesystem` needs `STORAGE_ROOT`) |
//! | `WAREHOUSE_BACKEND` | `bigquery` (`postgres` needs `DATABASE_URL`) |
//! | `BIGQUERY_DATASET` | `gf_pozos` |
//! | `RESULTS_TABLE` / `METRICS_TABLE` | `resultados_pozos` / `metricas_procesamiento` |
//! | `UPSERT_STRATEGY` | `merge` |
//! | `CONTRACTORS_CSV` / `OPERATORS_CSV` / `PROCESSING_TYPES_CSV` | `contratista.csv` / `operadora.csv` / `tipo_procesamiento.csv` |
//! | `PROMPT_TEMPLATE_PATH` | unset (built-in template) |
//! | `GEMINI_TIMEOUT_SECS` | `300` |
//! | `GCS_BASE_URL` / `GCS_TIMEOUT_SECS` | `https://storage.googleapis.com` / `60` |
//! | `BIGQUERY_BASE_URL` / `BIGQUERY_QUERY_TIMEOUT_MS` | `https://bigquery.googleapis.com/bigquery/v2` / `10000` |
//! | `VERTEX_BASE_URL` | unset (regional endpoint) |
//! | `CLOUD_TASKS_BASE_URL` | `https://cloudtasks.googleapis.com/v2` |
//! | `GOOGLE_ACCESS_TOKEN` | unset (metadata server) |

use std::path::PathBuf;
use std::str::FromStr;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{PipelineVariant, UpsertStrategy};
use crate::warehouse::TableRef;

/// Where documents are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendKind {
    Gcs,
    /// Buckets are directories under `root`.
    Filesystem { root: PathBuf },
}

/// Where results and metrics are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseBackendKind {
    BigQuery,
    Postgres { database_url: String },
}

/// Cloud Tasks target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    /// `process_single` URL every task posts to. Dispatch is disabled
    /// without it.
    pub worker_url: Option<String>,
    /// Service account used to mint OIDC tokens on task requests.
    pub service_account: Option<String>,
}

/// The three reference-list files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePaths {
    pub contractors: PathBuf,
    pub operators: PathBuf,
    pub processing_types: PathBuf,
}

impl Default for ReferencePaths {
    fn default() -> Self {
        Self {
            contractors: PathBuf::from(defaults::CONTRACTORS_CSV),
            operators: PathBuf::from(defaults::OPERATORS_CSV),
            processing_types: PathBuf::from(defaults::PROCESSING_TYPES_CSV),
        }
    }
}

/// Google API roots and per-backend timeouts. Overridden for emulators and
/// tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub gcs_base_url: String,
    pub gcs_timeout_secs: u64,
    pub bigquery_base_url: String,
    pub bigquery_query_timeout_ms: u64,
    /// Regional `https://{region}-aiplatform.googleapis.com/v1` when unset.
    pub vertex_base_url: Option<String>,
    pub cloud_tasks_base_url: String,
    /// Static bearer token. The metadata server is used when unset.
    pub access_token: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            gcs_base_url: defaults::GCS_BASE_URL.to_string(),
            gcs_timeout_secs: defaults::BACKEND_TIMEOUT_SECS,
            bigquery_base_url: defaults::BIGQUERY_BASE_URL.to_string(),
            bigquery_query_timeout_ms: defaults::QUERY_TIMEOUT_MS,
            vertex_base_url: None,
            cloud_tasks_base_url: defaults::CLOUD_TASKS_BASE_URL.to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub project: String,
    pub region: String,
    pub queue: QueueConfig,
    pub default_model_version: String,
    pub variant: PipelineVariant,
    pub storage: StorageBackendKind,
    pub warehouse: WarehouseBackendKind,
    pub dataset: String,
    pub results_table: String,
    pub metrics_table: String,
    pub upsert_strategy: UpsertStrategy,
    pub reference: ReferencePaths,
    pub prompt_template_path: Option<PathBuf>,
    pub gemini_timeout_secs: u64,
    pub endpoints: EndpointConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            project: defaults::GCP_PROJECT.to_string(),
            region: defaults::GCP_REGION.to_string(),
            queue: QueueConfig {
                name: defaults::CLOUD_TASK_QUEUE.to_string(),
                worker_url: None,
                service_account: None,
            },
            default_model_version: defaults::MODEL_VERSION.to_string(),
            variant: PipelineVariant::default(),
            storage: StorageBackendKind::Gcs,
            warehouse: WarehouseBackendKind::BigQuery,
            dataset: defaults::DATASET.to_string(),
            results_table: defaults::RESULTS_TABLE.to_string(),
            metrics_table: defaults::METRICS_TABLE.to_string(),
            upsert_strategy: UpsertStrategy::default(),
            reference: ReferencePaths::default(),
            prompt_template_path: None,
            gemini_timeout_secs: defaults::GEN_TIMEOUT_SECS,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base = Self::default();

        let port = match get("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", v)))?,
            None => base.port,
        };

        let storage = match get("STORAGE_BACKEND")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("gcs") => StorageBackendKind::Gcs,
            Some("filesystem") | Some("fs") => StorageBackendKind::Filesystem {
                root: get("STORAGE_ROOT").map(PathBuf::from).ok_or_else(|| {
                    Error::Config("STORAGE_BACKEND=filesystem requires STORAGE_ROOT".into())
                })?,
            },
            Some(other) => {
                return Err(Error::Config(format!("Unknown storage backend: {}", other)))
            }
        };

        let warehouse = match get("WAREHOUSE_BACKEND")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("bigquery") => WarehouseBackendKind::BigQuery,
            Some("postgres") | Some("postgresql") => WarehouseBackendKind::Postgres {
                database_url: get("DATABASE_URL").ok_or_else(|| {
                    Error::Config("WAREHOUSE_BACKEND=postgres requires DATABASE_URL".into())
                })?,
            },
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown warehouse backend: {}",
                    other
                )))
            }
        };

        let variant = match get("PIPELINE_VARIANT") {
            Some(v) => PipelineVariant::from_str(&v)?,
            None => base.variant,
        };

        let upsert_strategy = match get("UPSERT_STRATEGY") {
            Some(v) => UpsertStrategy::from_str(&v)?,
            None => base.upsert_strategy,
        };

        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::Config(format!("{} is not a number: {}", key, v))),
                None => Ok(default),
            }
        };
        let gemini_timeout_secs = number("GEMINI_TIMEOUT_SECS", base.gemini_timeout_secs)?;

        let endpoints = EndpointConfig {
            gcs_base_url: get("GCS_BASE_URL").unwrap_or(base.endpoints.gcs_base_url),
            gcs_timeout_secs: number("GCS_TIMEOUT_SECS", base.endpoints.gcs_timeout_secs)?,
            bigquery_base_url: get("BIGQUERY_BASE_URL")
                .unwrap_or(base.endpoints.bigquery_base_url),
            bigquery_query_timeout_ms: number(
                "BIGQUERY_QUERY_TIMEOUT_MS",
                base.endpoints.bigquery_query_timeout_ms,
            )?,
            vertex_base_url: get("VERTEX_BASE_URL"),
            cloud_tasks_base_url: get("CLOUD_TASKS_BASE_URL")
                .unwrap_or(base.endpoints.cloud_tasks_base_url),
            access_token: get("GOOGLE_ACCESS_TOKEN"),
        };

        Ok(Self {
            host: get("HOST").unwrap_or(base.host),
            port,
            project: get("GCP_PROJECT").unwrap_or(base.project),
            region: get("GCP_REGION").unwrap_or(base.region),
            queue: QueueConfig {
                name: get("CLOUD_TASK_QUEUE").unwrap_or(base.queue.name),
                worker_url: get("WORKER_URL"),
                service_account: get("TASK_SERVICE_ACCOUNT"),
            },
            default_model_version: get("DEFAULT_MODEL_VERSION")
                .unwrap_or(base.default_model_version),
            variant,
            storage,
            warehouse,
            dataset: get("BIGQUERY_DATASET").unwrap_or(base.dataset),
            results_table: get("RESULTS_TABLE").unwrap_or(base.results_table),
            metrics_table: get("METRICS_TABLE").unwrap_or(base.metrics_table),
            upsert_strategy,
            reference: ReferencePaths {
                contractors: get("CONTRACTORS_CSV")
                    .map(PathBuf::from)
                    .unwrap_or(base.reference.contractors),
                operators: get("OPERATORS_CSV")
                    .map(PathBuf::from)
                    .unwrap_or(base.reference.operators),
                processing_types: get("PROCESSING_TYPES_CSV")
                    .map(PathBuf::from)
                    .unwrap_or(base.reference.processing_types),
            },
            prompt_template_path: get("PROMPT_TEMPLATE_PATH").map(PathBuf::from),
            gemini_timeout_secs,
            endpoints,
        })
    }

    pub fn results_table_ref(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.results_table)
    }

    pub fn metrics_table_ref(&self) -> TableRef {
        TableRef::new(&self.project, &self.dataset, &self.metrics_table)
    }
}
