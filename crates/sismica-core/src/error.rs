//! Error types for sismica.

use thiserror::Error;

/// Result type alias using sismica's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for sismica operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found (object, table, row)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object storage backend failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generative model call failed or returned no usable text
    #[error("Inference error: {0}")]
    Inference(String),

    /// Warehouse (results/metrics tables) operation failed
    #[error("Warehouse error: {0}")]
    Warehouse(String),

    /// Task queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Serialization(format!("CSV: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("gs://bucket/a.pdf".to_string());
        assert_eq!(err.to_string(), "Not found: gs://bucket/a.pdf");
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("GCS returned 403".to_string());
        assert_eq!(err.to_string(), "Storage error: GCS returned 403");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Inference error: quota exceeded");
    }

    #[test]
    fn test_error_display_warehouse() {
        let err = Error::Warehouse("access denied".to_string());
        assert_eq!(err.to_string(), "Warehouse error: access denied");
    }

    #[test]
    fn test_error_display_queue() {
        let err = Error::Queue("queue paused".to_string());
        assert_eq!(err.to_string(), "Queue error: queue paused");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("WORKER_URL is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: WORKER_URL is not set");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("negative count".to_string());
        assert_eq!(err.to_string(), "Invalid input: negative count");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
