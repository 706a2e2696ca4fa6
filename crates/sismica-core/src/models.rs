//! Request, result and metric types shared across crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Error;

/// One document to process.
///
/// This is also the JSON body of every task the dispatcher enqueues, so the
/// field names are a wire contract with the worker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub bucket_name: String,
    pub blob_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

/// Body of one outbound task-queue message.
pub type EnqueuedTask = ExtractionRequest;

fn default_model_version() -> String {
    defaults::MODEL_VERSION.to_string()
}

impl ExtractionRequest {
    pub fn new(
        bucket_name: impl Into<String>,
        blob_name: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            blob_name: blob_name.into(),
            model_version: model_version.into(),
        }
    }
}

/// Raw bytes of a stored document plus its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl Document {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A stored model response, keyed by object path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub archivo: String,
    pub respuesta_modelo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_procesamiento: Option<DateTime<Utc>>,
}

/// Terminal outcome of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the append-only metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetric {
    pub archivo: String,
    pub fecha_procesamiento: DateTime<Utc>,
    pub status: ProcessingStatus,
    pub error_mensaje: Option<String>,
    pub tiempo_procesamiento_seg: f64,
    pub model_version: String,
}

impl ProcessingMetric {
    /// Metric for a completed extraction.
    pub fn success(archivo: &str, elapsed_secs: f64, model_version: &str) -> Self {
        Self {
            archivo: archivo.to_string(),
            fecha_procesamiento: Utc::now(),
            status: ProcessingStatus::Success,
            error_mensaje: None,
            tiempo_procesamiento_seg: elapsed_secs,
            model_version: model_version.to_string(),
        }
    }

    /// Metric for a failed extraction.
    pub fn failure(archivo: &str, error: &str, elapsed_secs: f64, model_version: &str) -> Self {
        Self {
            archivo: archivo.to_string(),
            fecha_procesamiento: Utc::now(),
            status: ProcessingStatus::Error,
            error_mensaje: Some(error.to_string()),
            tiempo_procesamiento_seg: elapsed_secs,
            model_version: model_version.to_string(),
        }
    }
}

/// Which of the two deployment shapes the service runs as.
///
/// `Full` stores a processing timestamp with each result, records a metric
/// row per attempt and reports elapsed time. `Minimal` stores only the
/// path and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    #[default]
    Full,
    Minimal,
}

impl PipelineVariant {
    pub fn records_metrics(&self) -> bool {
        matches!(self, Self::Full)
    }

    pub fn stores_timestamp(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl FromStr for PipelineVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "a" => Ok(Self::Full),
            "minimal" | "b" => Ok(Self::Minimal),
            other => Err(Error::Config(format!("Unknown pipeline variant: {}", other))),
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Minimal => write!(f, "minimal"),
        }
    }
}

/// How the results table is upserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertStrategy {
    /// Single conditional statement (`MERGE` / `ON CONFLICT`).
    #[default]
    Merge,
    /// Count, then update or insert in a second request.
    ///
    /// Two concurrent calls for the same path can both observe zero rows and
    /// both insert. Accepted behaviour for this strategy.
    CheckThenWrite,
}

impl FromStr for UpsertStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "merge" => Ok(Self::Merge),
            "check-then-write" => Ok(Self::CheckThenWrite),
            other => Err(Error::Config(format!("Unknown upsert strategy: {}", other))),
        }
    }
}

impl fmt::Display for UpsertStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::CheckThenWrite => write!(f, "check-then-write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_request_wire_shape() {
        let req = ExtractionRequest::new("bucket", "lines/a.pdf", "gemini-2.5-pro");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bucket_name": "bucket",
                "blob_name": "lines/a.pdf",
                "model_version": "gemini-2.5-pro"
            })
        );
    }

    #[test]
    fn test_extraction_request_defaults_model_version() {
        let req: ExtractionRequest =
            serde_json::from_str(r#"{"bucket_name": "b", "blob_name": "x.tif"}"#).unwrap();
        assert_eq!(req.model_version, defaults::MODEL_VERSION);
    }

    #[test]
    fn test_processing_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ProcessingStatus::Success).unwrap(),
            "success"
        );
        assert_eq!(ProcessingStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_metric_constructors() {
        let ok = ProcessingMetric::success("a.pdf", 1.5, "m");
        assert_eq!(ok.status, ProcessingStatus::Success);
        assert!(ok.error_mensaje.is_none());

        let failed = ProcessingMetric::failure("a.pdf", "boom", 0.2, "m");
        assert_eq!(failed.status, ProcessingStatus::Error);
        assert_eq!(failed.error_mensaje.as_deref(), Some("boom"));
        assert_eq!(failed.tiempo_procesamiento_seg, 0.2);
    }

    #[test]
    fn test_pipeline_variant_parse() {
        assert_eq!("full".parse::<PipelineVariant>().unwrap(), PipelineVariant::Full);
        assert_eq!("Minimal".parse::<PipelineVariant>().unwrap(), PipelineVariant::Minimal);
        assert!("both".parse::<PipelineVariant>().is_err());
        assert!(PipelineVariant::Full.records_metrics());
        assert!(!PipelineVariant::Minimal.stores_timestamp());
    }

    #[test]
    fn test_upsert_strategy_parse() {
        assert_eq!("merge".parse::<UpsertStrategy>().unwrap(), UpsertStrategy::Merge);
        assert_eq!(
            "check_then_write".parse::<UpsertStrategy>().unwrap(),
            UpsertStrategy::CheckThenWrite
        );
        assert!("upsert".parse::<UpsertStrategy>().is_err());
    }
}
