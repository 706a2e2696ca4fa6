//! `POST /process_single`: run the extraction pipeline for one document.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use sismica_core::{Error, ExtractionRequest};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessSingleRequest {
    pub bucket_name: String,
    pub blob_name: String,
    #[serde(default)]
    pub model_version: Option<String>,
}

/// Parse the body, keeping whatever `blob_name` is recoverable for the
/// error response.
fn parse_request(body: &[u8]) -> std::result::Result<ProcessSingleRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ApiError::for_archivo(
            Error::InvalidInput(format!("request body: {}", e)).to_string(),
            "",
        )
    })?;
    let archivo = value
        .get("blob_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(value).map_err(|e| {
        ApiError::for_archivo(
            Error::InvalidInput(format!("request body: {}", e)).to_string(),
            archivo,
        )
    })
}

pub async fn process_single(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let request = body
        .map_err(|rejection| ApiError::for_archivo(ApiError::from(rejection).to_string(), ""))
        .and_then(|body| parse_request(&body))
        .map_err(|e| {
            error!(
                subsystem = "api",
                component = "process_single",
                archivo = e.archivo().unwrap_or_default(),
                error = %e,
                "Rejected request body"
            );
            e
        })?;

    let request = ExtractionRequest::new(
        request.bucket_name,
        request.blob_name,
        request
            .model_version
            .unwrap_or_else(|| state.default_model_version.to_string()),
    );

    let report = state.pipeline.process(&request).await?;
    let body = if state.pipeline.variant().records_metrics() {
        json!({ "procesado": report.archivo, "tiempo_seg": report.elapsed_secs() })
    } else {
        json!({ "procesado": report.archivo })
    };
    Ok(Json(body))
}
