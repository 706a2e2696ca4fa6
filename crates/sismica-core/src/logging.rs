//! Field names for structured logging.
//!
//! Call sites write these names as literal keys in `tracing` macros; this
//! module is the single list of what each one means, so log queries work
//! across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Failed request or pipeline run |
//! | WARN  | Recoverable issue (error metric not written, template placeholder missing) |
//! | INFO  | Lifecycle events, completed pipelines and dispatch batches |
//! | DEBUG | Backend calls, table creation, config choices |
//! | TRACE | Per-object listing |

/// UUIDv7 set by the HTTP layer, on the `http_request` span.
pub const REQUEST_ID: &str = "request_id";

/// "api", "store", "database", "inference", "jobs" or "auth".
pub const SUBSYSTEM: &str = "subsystem";

/// Backend or stage within a subsystem: "gcs", "bigquery", "gemini", "pipeline".
pub const COMPONENT: &str = "component";

/// Operation: "fetch", "list", "generate", "query", "enqueue", "process".
pub const OPERATION: &str = "op";

pub const BUCKET: &str = "bucket";

/// Object path inside the bucket; the results table key.
pub const ARCHIVO: &str = "archivo";

pub const DB_TABLE: &str = "db_table";

pub const DURATION_MS: &str = "duration_ms";

/// Objects listed or tasks enqueued.
pub const RESULT_COUNT: &str = "result_count";

pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";
pub const DOCUMENT_BYTES: &str = "document_bytes";

/// Gemini model version.
pub const MODEL: &str = "model";

pub const SUCCESS: &str = "success";

/// Error display string.
pub const ERROR_MSG: &str = "error";

/// Every field above.
pub const FIELDS: &[&str] = &[
    REQUEST_ID,
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    BUCKET,
    ARCHIVO,
    DB_TABLE,
    DURATION_MS,
    RESULT_COUNT,
    PROMPT_LEN,
    RESPONSE_LEN,
    DOCUMENT_BYTES,
    MODEL,
    SUCCESS,
    ERROR_MSG,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let mut seen = std::collections::HashSet::new();
        for field in FIELDS {
            assert!(seen.insert(*field), "duplicate field {}", field);
            assert!(field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
