//! Mock document model for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sismica_inference::mock::MockDocumentModel;
//!
//! let model = MockDocumentModel::new().with_fixed_response("{\"codigo\": null}");
//! let text = model.generate_from_document(&doc, "prompt", "gemini-2.5-flash").await?;
//! assert_eq!(model.call_count(), 1);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sismica_core::{Document, DocumentModel, Error, Result};

#[derive(Debug, Clone)]
struct MockConfig {
    response: String,
    failure: Option<String>,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            response: "{}".to_string(),
            failure: None,
            latency_ms: 0,
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub content_type: String,
    pub document_bytes: usize,
    pub prompt: String,
    pub model_version: String,
}

#[derive(Clone, Default)]
pub struct MockDocumentModel {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockDocumentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text returned by every call. Surrounding whitespace is trimmed like
    /// the real backend does.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).response = response.into();
        self
    }

    /// Fail every call with an inference error carrying `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentModel for MockDocumentModel {
    async fn generate_from_document(
        &self,
        document: &Document,
        prompt: &str,
        model_version: &str,
    ) -> Result<String> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                content_type: document.content_type.clone(),
                document_bytes: document.len(),
                prompt: prompt.to_string(),
                model_version: model_version.to_string(),
            });
        }
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
        if let Some(ref message) = self.config.failure {
            return Err(Error::Inference(message.clone()));
        }
        Ok(self.config.response.trim().to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
