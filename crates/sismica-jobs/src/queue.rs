//! Cloud Tasks queue: one HTTP POST task per document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use sismica_core::{
    defaults, EnqueuedTask, Error, Result, ServiceConfig, TaskQueue, TokenProvider,
};

#[derive(Debug, Clone)]
pub struct CloudTasksConfig {
    /// API root including `/v2`.
    pub base_url: String,
    pub project: String,
    pub region: String,
    pub queue: String,
    /// URL every task posts to.
    pub worker_url: String,
    /// Identity for an OIDC token on the task request, if the worker
    /// requires authentication.
    pub service_account: Option<String>,
    pub timeout_seconds: u64,
}

impl CloudTasksConfig {
    /// `None` when no worker URL is configured.
    pub fn from_service(config: &ServiceConfig) -> Option<Self> {
        let worker_url = config.queue.worker_url.clone()?;
        Some(Self {
            base_url: config.endpoints.cloud_tasks_base_url.clone(),
            project: config.project.clone(),
            region: config.region.clone(),
            queue: config.queue.name.clone(),
            worker_url,
            service_account: config.queue.service_account.clone(),
            timeout_seconds: defaults::BACKEND_TIMEOUT_SECS,
        })
    }

    /// `projects/{p}/locations/{r}/queues/{q}`
    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project, self.region, self.queue
        )
    }
}

/// Request body for `tasks.create`.
pub fn task_request(config: &CloudTasksConfig, task: &EnqueuedTask) -> Result<serde_json::Value> {
    let payload = serde_json::to_vec(task)?;
    let mut http_request = json!({
        "httpMethod": "POST",
        "url": config.worker_url,
        "headers": { "Content-Type": "application/json" },
        "body": base64::engine::general_purpose::STANDARD.encode(payload),
    });
    if let Some(ref account) = config.service_account {
        http_request["oidcToken"] = json!({
            "serviceAccountEmail": account,
            "audience": config.worker_url,
        });
    }
    Ok(json!({ "task": { "httpRequest": http_request } }))
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    name: String,
}

pub struct CloudTasksQueue {
    client: Client,
    config: CloudTasksConfig,
    auth: Arc<dyn TokenProvider>,
}

impl CloudTasksQueue {
    pub fn new(config: CloudTasksConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Queue(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    pub fn config(&self) -> &CloudTasksConfig {
        &self.config
    }
}

#[async_trait]
impl TaskQueue for CloudTasksQueue {
    async fn enqueue(&self, task: &EnqueuedTask) -> Result<String> {
        let body = task_request(&self.config, task)?;
        let url = format!(
            "{}/{}/tasks",
            self.config.base_url.trim_end_matches('/'),
            self.config.queue_path()
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.auth.access_token().await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Queue(format!("Task create request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Queue(format!(
                "Cloud Tasks returned {}: {}",
                status, text
            )));
        }
        let created: CreatedTask = response
            .json()
            .await
            .map_err(|e| Error::Queue(format!("Failed to parse created task: {}", e)))?;

        debug!(
            subsystem = "jobs",
            component = "cloud_tasks",
            op = "enqueue",
            archivo = %task.blob_name,
            task = %created.name,
            "Task enqueued"
        );
        Ok(created.name)
    }

    fn name(&self) -> &str {
        "cloud-tasks"
    }
}

// =============================================================================
// RECORDING QUEUE (tests)
// =============================================================================

/// In-memory queue that records every task.
#[cfg(any(test, feature = "mock"))]
#[derive(Default)]
pub struct RecordingQueue {
    tasks: std::sync::Mutex<Vec<EnqueuedTask>>,
    fail_after: Option<usize>,
}

#[cfg(any(test, feature = "mock"))]
impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` tasks, then fail every later enqueue.
    pub fn fail_after(n: usize) -> Self {
        Self {
            tasks: Default::default(),
            fail_after: Some(n),
        }
    }

    pub fn tasks(&self) -> Vec<EnqueuedTask> {
        self.tasks.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: &EnqueuedTask) -> Result<String> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| Error::Internal("queue lock poisoned".into()))?;
        if self.fail_after.is_some_and(|n| tasks.len() >= n) {
            return Err(Error::Queue("queue unavailable".into()));
        }
        tasks.push(task.clone());
        Ok(format!("tasks/{}", tasks.len()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sismica_core::{ExtractionRequest, StaticTokenProvider};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> CloudTasksConfig {
        CloudTasksConfig {
            base_url: base_url.to_string(),
            project: "proj".into(),
            region: "us-central1".into(),
            queue: "online-sismica".into(),
            worker_url: "https://worker.example/process_single".into(),
            service_account: None,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_task_request_body_decodes_to_request() {
        let task = ExtractionRequest::new("b", "lineas/a.pdf", "gemini-2.5-flash");
        let body = task_request(&config("http://x"), &task).unwrap();
        let http = &body["task"]["httpRequest"];
        assert_eq!(http["httpMethod"], "POST");
        assert_eq!(http["url"], "https://worker.example/process_single");
        assert_eq!(http["headers"]["Content-Type"], "application/json");
        assert!(http.get("oidcToken").is_none());

        let raw = base64::engine::general_purpose::STANDARD
            .decode(http["body"].as_str().unwrap())
            .unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            decoded,
            json!({"bucket_name": "b", "blob_name": "lineas/a.pdf", "model_version": "gemini-2.5-flash"})
        );
    }

    #[test]
    fn test_task_request_with_service_account() {
        let mut cfg = config("http://x");
        cfg.service_account = Some("tasks@proj.iam.gserviceaccount.com".into());
        let body = task_request(&cfg, &ExtractionRequest::new("b", "a.pdf", "m")).unwrap();
        let oidc = &body["task"]["httpRequest"]["oidcToken"];
        assert_eq!(oidc["serviceAccountEmail"], "tasks@proj.iam.gserviceaccount.com");
        assert_eq!(oidc["audience"], "https://worker.example/process_single");
    }

    #[test]
    fn test_from_service_requires_worker_url() {
        let mut service = ServiceConfig::default();
        assert!(CloudTasksConfig::from_service(&service).is_none());
        service.queue.worker_url = Some("https://w/process_single".into());
        let cfg = CloudTasksConfig::from_service(&service).unwrap();
        assert_eq!(
            cfg.queue_path(),
            "projects/extrac-datos-geosys-production/locations/us-central1/queues/online-sismica"
        );
        assert_eq!(cfg.base_url, "https://cloudtasks.googleapis.com/v2");
    }

    #[test]
    fn test_from_service_uses_configured_endpoint() {
        let mut service = ServiceConfig::default();
        service.queue.worker_url = Some("https://w/process_single".into());
        service.endpoints.cloud_tasks_base_url = "http://127.0.0.1:8123/v2".into();
        let cfg = CloudTasksConfig::from_service(&service).unwrap();
        assert_eq!(cfg.base_url, "http://127.0.0.1:8123/v2");
    }

    #[tokio::test]
    async fn test_enqueue_posts_to_queue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/proj/locations/us-central1/queues/online-sismica/tasks"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_partial_json(json!({"task": {"httpRequest": {"httpMethod": "POST"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/proj/locations/us-central1/queues/online-sismica/tasks/123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let queue =
            CloudTasksQueue::new(config(&server.uri()), Arc::new(StaticTokenProvider::new("tok")))
                .unwrap();
        let name = queue
            .enqueue(&ExtractionRequest::new("b", "a.pdf", "m"))
            .await
            .unwrap();
        assert!(name.ends_with("/tasks/123"));
    }

    #[tokio::test]
    async fn test_enqueue_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let queue =
            CloudTasksQueue::new(config(&server.uri()), Arc::new(StaticTokenProvider::new("tok")))
                .unwrap();
        let err = queue
            .enqueue(&ExtractionRequest::new("b", "a.pdf", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Queue(_)));
        assert!(err.to_string().contains("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn test_recording_queue_fail_after() {
        let queue = RecordingQueue::fail_after(1);
        queue.enqueue(&ExtractionRequest::new("b", "1.pdf", "m")).await.unwrap();
        assert!(queue.enqueue(&ExtractionRequest::new("b", "2.pdf", "m")).await.is_err());
        assert_eq!(queue.tasks().len(), 1);
    }
}
