//! Batch dispatch: list documents under a `gs://bucket/prefix` path and
//! enqueue one extraction task per document.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use sismica_core::{defaults, DocumentStore, EnqueuedTask, Error, Result, TaskQueue};

/// A `gs://bucket/prefix` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath {
    pub bucket: String,
    pub prefix: String,
}

impl StoragePath {
    /// Strip an optional `gs://` scheme and split at the first `/`.
    ///
    /// A path with no `/` after the bucket is rejected; the prefix may be
    /// empty (`gs://bucket/`).
    pub fn parse(path: &str) -> Result<Self> {
        let rest = path.strip_prefix("gs://").unwrap_or(path);
        match rest.split_once('/') {
            Some((bucket, prefix)) if !bucket.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            }),
            _ => Err(Error::InvalidInput(format!(
                "Expected gs://bucket/prefix, got {:?}",
                path
            ))),
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.prefix)
    }
}

/// Case-sensitive suffix match against the supported document extensions.
pub fn is_supported_document(name: &str) -> bool {
    defaults::DOCUMENT_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(ext))
}

pub struct TaskDispatcher {
    store: Arc<dyn DocumentStore>,
    queue: Option<Arc<dyn TaskQueue>>,
}

impl TaskDispatcher {
    /// `queue` is `None` when no worker URL is configured; every dispatch
    /// then fails with a configuration error.
    pub fn new(store: Arc<dyn DocumentStore>, queue: Option<Arc<dyn TaskQueue>>) -> Self {
        Self { store, queue }
    }

    /// Enqueue up to `limit` tasks for supported documents under
    /// `bucket_path`, in listing order. Returns how many were enqueued.
    ///
    /// Tasks go out one at a time; the first failure aborts the batch and
    /// leaves earlier tasks queued.
    pub async fn dispatch(
        &self,
        bucket_path: &str,
        limit: usize,
        model_version: &str,
    ) -> Result<usize> {
        let start = Instant::now();
        let location = StoragePath::parse(bucket_path)?;
        let queue = self.queue.as_ref().ok_or_else(|| {
            Error::Config("WORKER_URL is not set; task dispatch is disabled".to_string())
        })?;

        let names = self.store.list(&location.bucket, &location.prefix).await?;
        let listed = names.len();
        let selected: Vec<String> = names
            .into_iter()
            .filter(|n| is_supported_document(n))
            .take(limit)
            .collect();

        for (sent, blob_name) in selected.iter().enumerate() {
            let task = EnqueuedTask::new(&location.bucket, blob_name, model_version);
            if let Err(e) = queue.enqueue(&task).await {
                error!(
                    subsystem = "jobs",
                    component = "dispatcher",
                    op = "dispatch",
                    bucket = %location.bucket,
                    archivo = %blob_name,
                    enqueued = sent,
                    error = %e,
                    "Enqueue failed; aborting batch"
                );
                return Err(e);
            }
        }

        info!(
            subsystem = "jobs",
            component = "dispatcher",
            op = "dispatch",
            path = %location,
            listed,
            result_count = selected.len(),
            model = model_version,
            queue = queue.name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tasks dispatched"
        );
        Ok(selected.len())
    }
}
