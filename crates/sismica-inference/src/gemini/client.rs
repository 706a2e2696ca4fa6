//! Vertex AI Gemini backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, info, warn};

use sismica_core::{
    defaults, Document, DocumentModel, Error, Result, ServiceConfig, TokenProvider,
};

use super::types::*;

/// Configuration for the Vertex AI endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root including the version, e.g.
    /// `https://us-central1-aiplatform.googleapis.com/v1`.
    pub base_url: String,
    pub project: String,
    pub region: String,
    /// Request timeout in seconds. Document extraction is slow.
    pub timeout_seconds: u64,
}

impl GeminiConfig {
    /// Regional endpoint for `project` / `region`.
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            base_url: format!("https://{}-aiplatform.googleapis.com/v1", region),
            project: project.into(),
            region,
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }

    /// From the service configuration; a configured Vertex base URL
    /// replaces the regional endpoint.
    pub fn from_service(config: &ServiceConfig) -> Self {
        let mut gemini = Self::new(&config.project, &config.region);
        gemini.timeout_seconds = config.gemini_timeout_secs;
        if let Some(ref url) = config.endpoints.vertex_base_url {
            gemini.base_url = url.clone();
        }
        gemini
    }
}

/// Fixed sampling parameters: deterministic output, long JSON answers.
pub fn generation_config() -> GenerationConfig {
    GenerationConfig {
        temperature: defaults::TEMPERATURE,
        top_p: defaults::TOP_P,
        max_output_tokens: defaults::MAX_OUTPUT_TOKENS,
    }
}

/// Block only high-probability harm in the four configurable categories.
pub fn safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::HarmCategoryHateSpeech,
        HarmCategory::HarmCategoryDangerousContent,
        HarmCategory::HarmCategorySexuallyExplicit,
        HarmCategory::HarmCategoryHarassment,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockOnlyHigh,
    })
    .collect()
}

/// Document part first, then the prompt, in a single user turn.
pub fn build_request(document: &Document, prompt: &str) -> GenerateContentRequest {
    let data = base64::engine::general_purpose::STANDARD.encode(&document.data);
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part::inline(document.content_type.clone(), data),
                Part::text(prompt),
            ],
        }],
        generation_config: generation_config(),
        safety_settings: safety_settings(),
    }
}

pub struct VertexGeminiBackend {
    client: Client,
    config: GeminiConfig,
    auth: Arc<dyn TokenProvider>,
}

impl VertexGeminiBackend {
    pub fn new(config: GeminiConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini",
            op = "init",
            project = %config.project,
            region = %config.region,
            timeout_secs = config.timeout_seconds,
            "Initializing Vertex AI Gemini backend"
        );
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model_version: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.project,
            self.config.region,
            model_version
        )
    }
}

/// Error text for a non-success response, preferring the API's message.
fn api_error(status: reqwest::StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => Error::Inference(format!(
            "Vertex AI returned {} {}: {}",
            status.as_u16(),
            parsed.error.status,
            parsed.error.message
        )),
        Err(_) => Error::Inference(format!("Vertex AI returned {}: {}", status, body)),
    }
}

#[async_trait]
impl DocumentModel for VertexGeminiBackend {
    async fn generate_from_document(
        &self,
        document: &Document,
        prompt: &str,
        model_version: &str,
    ) -> Result<String> {
        let start = Instant::now();
        let request = build_request(document, prompt);
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .post(self.endpoint(model_version))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse generation response: {}", e)))?;

        let text = match result.first_candidate_text() {
            Some(text) => text,
            None => {
                let reason = result
                    .prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.clone())
                    .map(|r| format!("prompt blocked: {}", r))
                    .or_else(|| {
                        result
                            .candidates
                            .first()
                            .and_then(|c| c.finish_reason.clone())
                            .map(|r| format!("finish reason: {}", r))
                    })
                    .unwrap_or_else(|| "no candidates".to_string());
                warn!(
                    subsystem = "inference",
                    component = "gemini",
                    model = model_version,
                    reason = %reason,
                    "Model returned no text"
                );
                return Err(Error::Inference(format!("Model returned no text ({})", reason)));
            }
        };

        let trimmed = text.trim().to_string();
        debug!(
            subsystem = "inference",
            component = "gemini",
            op = "generate",
            model = model_version,
            document_bytes = document.len(),
            prompt_len = prompt.len(),
            response_len = trimmed.len(),
            prompt_tokens = result.usage_metadata.as_ref().map(|u| u.prompt_token_count),
            output_tokens = result.usage_metadata.as_ref().map(|u| u.candidates_token_count),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(trimmed)
    }

    fn name(&self) -> &str {
        "vertex-gemini"
    }
}
