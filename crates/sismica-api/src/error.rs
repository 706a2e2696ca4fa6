//! HTTP error responses.
//!
//! Every failure the service reports is a 500 with a JSON body: `{error}`
//! for dispatch, `{error, archivo}` for single-document processing.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use sismica_jobs::ProcessFailure;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    message: String,
    archivo: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            archivo: None,
        }
    }

    /// Error tied to a document path.
    pub fn for_archivo(message: impl Into<String>, archivo: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            archivo: Some(archivo.into()),
        }
    }

    pub fn archivo(&self) -> Option<&str> {
        self.archivo.as_deref()
    }
}

impl From<sismica_core::Error> for ApiError {
    fn from(err: sismica_core::Error) -> Self {
        ApiError::new(err.to_string())
    }
}

/// Body that could not be read, including one over the size limit.
impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::new(format!("request body: {}", rejection.body_text()))
    }
}

impl From<ProcessFailure> for ApiError {
    fn from(failure: ProcessFailure) -> Self {
        ApiError::for_archivo(failure.error.to_string(), failure.archivo)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.archivo {
            Some(archivo) => json!({ "error": self.message, "archivo": archivo }),
            None => json!({ "error": self.message }),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
