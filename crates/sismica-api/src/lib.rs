//! # sismica-api
//!
//! HTTP surface of the extraction service: health, batch dispatch and
//! single-document processing.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use sismica_core::{defaults, gcp_auth, Result, ServiceConfig, TaskQueue};
use sismica_inference::{GeminiConfig, PromptBuilder, ReferenceLists, VertexGeminiBackend};
use sismica_jobs::{CloudTasksConfig, CloudTasksQueue, ExtractionPipeline, TaskDispatcher};
use sismica_store::{build_document_store, build_warehouse, MetricsStore, ResultStore};

pub use error::ApiError;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TaskDispatcher>,
    pub pipeline: Arc<ExtractionPipeline>,
    /// Model used when a request does not name one.
    pub default_model_version: Arc<str>,
}

impl AppState {
    pub fn new(
        dispatcher: TaskDispatcher,
        pipeline: ExtractionPipeline,
        default_model_version: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            pipeline: Arc::new(pipeline),
            default_model_version: default_model_version.into(),
        }
    }
}

/// Wire every backend from configuration.
///
/// Reference lists are read and the prompt rendered once here; a missing
/// list file stops startup.
pub async fn build_state(config: &ServiceConfig) -> Result<AppState> {
    let auth = gcp_auth::provider_from_config(&config.endpoints);

    let store = build_document_store(config, auth.clone())?;
    let warehouse = build_warehouse(config, auth.clone()).await?;

    let lists = ReferenceLists::load(&config.reference)?;
    let prompt = PromptBuilder::from_optional_file(config.prompt_template_path.as_deref())?
        .render(&lists);
    info!(
        subsystem = "api",
        op = "init",
        prompt_len = prompt.len(),
        "Prompt rendered"
    );

    let model = Arc::new(VertexGeminiBackend::new(
        GeminiConfig::from_service(config),
        auth.clone(),
    )?);

    let queue: Option<Arc<dyn TaskQueue>> = match CloudTasksConfig::from_service(config) {
        Some(tasks_config) => Some(Arc::new(CloudTasksQueue::new(tasks_config, auth)?)),
        None => {
            info!(
                subsystem = "api",
                op = "init",
                "WORKER_URL not set; enqueue_tasks will fail"
            );
            None
        }
    };

    let results = ResultStore::new(
        warehouse.clone(),
        config.results_table_ref(),
        config.upsert_strategy,
        config.variant,
    );
    let metrics = MetricsStore::new(warehouse, config.metrics_table_ref());
    let pipeline = ExtractionPipeline::new(
        store.clone(),
        model,
        Arc::from(prompt),
        results,
        Some(metrics),
        config.variant,
    );
    let dispatcher = TaskDispatcher::new(store, queue);

    Ok(AppState::new(
        dispatcher,
        pipeline,
        config.default_model_version.as_str(),
    ))
}

// =============================================================================
// ROUTER
// =============================================================================

/// Request span carrying the correlation ID set by `SetRequestIdLayer`.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/enqueue_tasks", post(handlers::enqueue_tasks))
        .route("/process_single", post(handlers::process_single))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        // Oversized bodies surface as a `BytesRejection` in the handlers and
        // get the same JSON error shape as any other failure.
        .layer(DefaultBodyLimit::max(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state)
}
