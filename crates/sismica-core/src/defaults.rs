//! Centralized default constants for the sismica service.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP listen host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Maximum request body size in bytes. Requests only carry small JSON bodies.
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

/// Plain-text body returned by the health endpoint.
pub const HEALTH_BODY: &str = "API activa";

// =============================================================================
// GOOGLE CLOUD
// =============================================================================

/// Default GCP project for the model, queue and warehouse.
pub const GCP_PROJECT: &str = "extrac-datos-geosys-production";

/// Default GCP region for Vertex AI and Cloud Tasks.
pub const GCP_REGION: &str = "us-central1";

/// Default Cloud Tasks queue name.
pub const CLOUD_TASK_QUEUE: &str = "online-sismica";

/// GCS JSON API root.
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// BigQuery REST API root.
pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Cloud Tasks REST API root.
pub const CLOUD_TASKS_BASE_URL: &str = "https://cloudtasks.googleapis.com/v2";

/// Compute metadata server token endpoint (Cloud Run, GCE, GKE).
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh cached access tokens this many seconds before they expire.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default generative model when a request does not name one.
pub const MODEL_VERSION: &str = "gemini-2.5-flash";

/// Decoding temperature. Extraction must be deterministic.
pub const TEMPERATURE: f32 = 0.0;

/// Nucleus sampling top-p.
pub const TOP_P: f32 = 0.95;

/// Maximum output tokens per response.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// HTTP timeout for a single model call in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Timeout for storage, warehouse and queue requests in seconds.
pub const BACKEND_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// WAREHOUSE
// =============================================================================

/// Default BigQuery dataset (PostgreSQL schema).
pub const DATASET: &str = "gf_pozos";

/// Default results table.
pub const RESULTS_TABLE: &str = "resultados_pozos";

/// Default metrics table.
pub const METRICS_TABLE: &str = "metricas_procesamiento";

/// Server-side wait for a BigQuery query before polling again, in milliseconds.
pub const QUERY_TIMEOUT_MS: u64 = 10_000;

// =============================================================================
// DISPATCH
// =============================================================================

/// Default number of documents enqueued per enqueue-tasks request.
pub const DISPATCH_COUNT: i64 = 10;

/// File suffixes eligible for extraction (case-sensitive).
pub const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".png", ".tiff", ".tif"];

// =============================================================================
// REFERENCE DATA
// =============================================================================

/// Default contractor list file.
pub const CONTRACTORS_CSV: &str = "contratista.csv";

/// Default operator list file.
pub const OPERATORS_CSV: &str = "operadora.csv";

/// Default processing-type list file.
pub const PROCESSING_TYPES_CSV: &str = "tipo_procesamiento.csv";

// =============================================================================
// STORAGE
// =============================================================================

/// MIME type used when a backend declares none.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
