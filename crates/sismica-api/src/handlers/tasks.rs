//! `POST /enqueue_tasks`: fan a bucket prefix out into Cloud Tasks.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use sismica_core::{defaults, Error, Result};

use crate::error::ApiError;
use crate::AppState;

/// Number of documents to enqueue. Clients send a JSON integer, an
/// integral float such as `10.0`, or an integer string.
///
/// Negative and fractional counts are rejected rather than clamped or
/// truncated: a caller asking for `-1` or `2.5` documents gets an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cantidad {
    Number(i64),
    Float(f64),
    Text(String),
}

impl Cantidad {
    pub fn resolve(&self) -> Result<usize> {
        let n = match self {
            Cantidad::Number(n) => *n,
            Cantidad::Float(f) => {
                if f.fract() != 0.0 || !f.is_finite() || f.abs() > i64::MAX as f64 {
                    return Err(Error::InvalidInput(format!(
                        "cantidad is not an integer: {}",
                        f
                    )));
                }
                *f as i64
            }
            Cantidad::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                Error::InvalidInput(format!("cantidad is not an integer: {:?}", s))
            })?,
        };
        usize::try_from(n)
            .map_err(|_| Error::InvalidInput(format!("cantidad must not be negative, got {}", n)))
    }
}

#[derive(Debug, Deserialize)]
pub struct EnqueueTasksRequest {
    pub bucket_path: String,
    #[serde(default)]
    pub cantidad: Option<Cantidad>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl EnqueueTasksRequest {
    pub fn limit(&self) -> Result<usize> {
        match self.cantidad {
            Some(ref c) => c.resolve(),
            None => Cantidad::Number(defaults::DISPATCH_COUNT).resolve(),
        }
    }
}

pub async fn enqueue_tasks(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let body = body.map_err(|rejection| {
        let e = ApiError::from(rejection);
        error!(
            subsystem = "api",
            component = "enqueue_tasks",
            error = %e,
            "Rejected request body"
        );
        e
    })?;
    match dispatch(&state, &body).await {
        Ok(sent) => Ok(Json(json!({ "tareas_enviadas": sent }))),
        Err(e) => {
            error!(
                subsystem = "api",
                component = "enqueue_tasks",
                error = %e,
                "Enqueue request failed"
            );
            Err(e.into())
        }
    }
}

async fn dispatch(state: &AppState, body: &[u8]) -> Result<usize> {
    let request: EnqueueTasksRequest = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidInput(format!("request body: {}", e)))?;
    let limit = request.limit()?;
    let model_version = request
        .model_version
        .as_deref()
        .unwrap_or(state.default_model_version.as_ref());

    info!(
        subsystem = "api",
        component = "enqueue_tasks",
        path = %request.bucket_path,
        cantidad = limit,
        model = model_version,
        "Dispatching tasks"
    );
    state
        .dispatcher
        .dispatch(&request.bucket_path, limit, model_version)
        .await
}
