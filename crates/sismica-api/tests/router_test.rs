//! Router tests for the three HTTP routes.
//!
//! Every backend is in memory: documents in `MemoryDocumentStore`, results
//! and metrics in `MemoryWarehouse`, tasks in `RecordingQueue`, model calls
//! in `MockDocumentModel`. Requests go through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use sismica_api::{router, AppState};
use sismica_core::{
    CellValue, EnqueuedTask, PipelineVariant, TableRef, TaskQueue, UpsertStrategy,
};
use sismica_inference::MockDocumentModel;
use sismica_jobs::{ExtractionPipeline, RecordingQueue, TaskDispatcher};
use sismica_store::{MemoryDocumentStore, MemoryWarehouse, MetricsStore, ResultStore};

struct TestApp {
    app: Router,
    store: Arc<MemoryDocumentStore>,
    warehouse: Arc<MemoryWarehouse>,
    queue: Arc<RecordingQueue>,
    model: MockDocumentModel,
}

fn results_table() -> TableRef {
    TableRef::new("proj", "gf_pozos", "resultados_pozos")
}

fn metrics_table() -> TableRef {
    TableRef::new("proj", "gf_pozos", "metricas_procesamiento")
}

fn build(variant: PipelineVariant, model: MockDocumentModel, with_queue: bool) -> TestApp {
    let store = Arc::new(MemoryDocumentStore::new());
    for name in [
        "lineas/SG00577.pdf",
        "lineas/SG00578.tif",
        "lineas/notas.txt",
        "lineas/SG00579.PNG",
        "lineas/SG00580.png",
    ] {
        store.insert("sismica-docs", name, b"%PDF-1.4 test".to_vec());
    }
    let warehouse = Arc::new(MemoryWarehouse::new());
    let queue = Arc::new(RecordingQueue::new());

    let results = ResultStore::new(
        warehouse.clone(),
        results_table(),
        UpsertStrategy::Merge,
        variant,
    );
    let metrics = MetricsStore::new(warehouse.clone(), metrics_table());
    let pipeline = ExtractionPipeline::new(
        store.clone(),
        Arc::new(model.clone()),
        Arc::from("PROMPT"),
        results,
        Some(metrics),
        variant,
    );
    let task_queue: Option<Arc<dyn TaskQueue>> = if with_queue {
        Some(queue.clone() as Arc<dyn TaskQueue>)
    } else {
        None
    };
    let dispatcher = TaskDispatcher::new(store.clone(), task_queue);
    let app = router(AppState::new(dispatcher, pipeline, "gemini-2.5-flash"));

    TestApp {
        app,
        store,
        warehouse,
        queue,
        model,
    }
}

fn default_app() -> TestApp {
    build(
        PipelineVariant::Full,
        MockDocumentModel::new().with_fixed_response("{\"codigo\": \"SG00577\"}"),
        true,
    )
}

async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn metric_statuses(warehouse: &MemoryWarehouse) -> Vec<String> {
    warehouse
        .rows(&metrics_table())
        .iter()
        .filter_map(|r| r.get("status").and_then(CellValue::as_str))
        .map(String::from)
        .collect()
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_health_returns_plain_text() {
    let t = default_app();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"API activa");
}

#[tokio::test]
async fn test_health_ignores_backend_failures() {
    let t = default_app();
    t.store.fail_with("storage down");
    t.warehouse.fail_operation("table_status", "warehouse down");
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// ENQUEUE TASKS
// =============================================================================

#[tokio::test]
async fn test_enqueue_filters_extensions_and_limits() {
    let t = default_app();
    let (status, body) = post(
        &t.app,
        "/enqueue_tasks",
        r#"{"bucket_path": "gs://sismica-docs/lineas/", "cantidad": "2", "model_version": "gemini-2.5-pro"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tareas_enviadas": 2}));
    assert_eq!(
        t.queue.tasks(),
        vec![
            EnqueuedTask::new("sismica-docs", "lineas/SG00577.pdf", "gemini-2.5-pro"),
            EnqueuedTask::new("sismica-docs", "lineas/SG00578.tif", "gemini-2.5-pro"),
        ]
    );
}

#[tokio::test]
async fn test_enqueue_defaults() {
    let t = default_app();
    let (status, body) = post(
        &t.app,
        "/enqueue_tasks",
        r#"{"bucket_path": "gs://sismica-docs/lineas/"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tareas_enviadas"], 3);
    assert!(t
        .queue
        .tasks()
        .iter()
        .all(|task| task.model_version == "gemini-2.5-flash"));
}

#[tokio::test]
async fn test_enqueue_zero_sends_nothing() {
    let t = default_app();
    let (status, body) = post(
        &t.app,
        "/enqueue_tasks",
        r#"{"bucket_path": "gs://sismica-docs/lineas/", "cantidad": 0}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tareas_enviadas": 0}));
    assert!(t.queue.tasks().is_empty());
}

#[tokio::test]
async fn test_enqueue_failures_are_500_with_error() {
    let t = default_app();
    for body in [
        r#"{"bucket_path": "gs://sismica-docs/lineas/", "cantidad": -3}"#,
        r#"{"cantidad": 1}"#,
        r#"{"bucket_path": "gs://sismica-docs"}"#,
        "not json",
    ] {
        let (status, response) = post(&t.app, "/enqueue_tasks", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
        assert!(response["error"].is_string(), "{}", body);
        assert!(response.get("tareas_enviadas").is_none());
    }
    assert!(t.queue.tasks().is_empty());
}

#[tokio::test]
async fn test_enqueue_without_worker_url_fails() {
    let t = build(PipelineVariant::Full, MockDocumentModel::new(), false);
    let (status, body) = post(
        &t.app,
        "/enqueue_tasks",
        r#"{"bucket_path": "gs://sismica-docs/lineas/"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("WORKER_URL"));
}

// =============================================================================
// PROCESS SINGLE
// =============================================================================

#[tokio::test]
async fn test_process_single_full_variant() {
    let t = default_app();
    let (status, body) = post(
        &t.app,
        "/process_single",
        r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/SG00577.pdf"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["procesado"], "lineas/SG00577.pdf");
    assert!(body["tiempo_seg"].as_f64().unwrap() >= 0.0);

    let rows = t.warehouse.rows(&results_table());
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("respuesta_modelo").and_then(CellValue::as_str),
        Some("{\"codigo\": \"SG00577\"}")
    );
    assert!(rows[0].get("fecha_procesamiento").is_some());
    assert_eq!(metric_statuses(&t.warehouse), vec!["success"]);
    assert_eq!(t.model.calls()[0].model_version, "gemini-2.5-flash");
}

#[tokio::test]
async fn test_process_single_twice_keeps_one_row() {
    let t = default_app();
    let request = r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/SG00577.pdf", "model_version": "gemini-2.5-pro"}"#;
    post(&t.app, "/process_single", request).await;
    let (status, _) = post(&t.app, "/process_single", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.warehouse.rows(&results_table()).len(), 1);
    assert_eq!(metric_statuses(&t.warehouse), vec!["success", "success"]);
    assert_eq!(t.model.calls()[1].model_version, "gemini-2.5-pro");
}

#[tokio::test]
async fn test_process_single_minimal_variant() {
    let t = build(PipelineVariant::Minimal, MockDocumentModel::new(), true);
    let (status, body) = post(
        &t.app,
        "/process_single",
        r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/SG00577.pdf"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"procesado": "lineas/SG00577.pdf"}));
    assert!(t.warehouse.rows(&metrics_table()).is_empty());
}

#[tokio::test]
async fn test_process_single_missing_document() {
    let t = default_app();
    let (status, body) = post(
        &t.app,
        "/process_single",
        r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/ausente.pdf"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["archivo"], "lineas/ausente.pdf");
    assert!(body["error"].is_string());
    assert_eq!(metric_statuses(&t.warehouse), vec!["error"]);
    assert!(t.warehouse.rows(&results_table()).is_empty());
}

#[tokio::test]
async fn test_process_single_model_failure() {
    let t = build(
        PipelineVariant::Full,
        MockDocumentModel::new().with_failure("SAFETY"),
        true,
    );
    let (status, body) = post(
        &t.app,
        "/process_single",
        r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/SG00577.pdf"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("SAFETY"));
    assert_eq!(body["archivo"], "lineas/SG00577.pdf");
}

#[tokio::test]
async fn test_process_single_error_metric_failure_keeps_response() {
    let t = default_app();
    t.warehouse.fail_operation("insert_rows", "metrics unavailable");
    let (status, body) = post(
        &t.app,
        "/process_single",
        r#"{"bucket_name": "sismica-docs", "blob_name": "lineas/ausente.pdf"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["archivo"], "lineas/ausente.pdf");
    assert!(body["error"].as_str().unwrap().contains("ausente.pdf"));
}

#[tokio::test]
async fn test_process_single_malformed_bodies() {
    let t = default_app();

    let (status, body) = post(&t.app, "/process_single", r#"{"blob_name": "lineas/x.pdf"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["archivo"], "lineas/x.pdf");
    assert!(body["error"].is_string());

    let (status, body) = post(&t.app, "/process_single", "{{{").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["archivo"], "");

    assert_eq!(t.model.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_json_500() {
    let t = default_app();
    let padding = "x".repeat(sismica_core::defaults::MAX_BODY_SIZE_BYTES + 1);

    let oversized = format!(r#"{{"bucket_path": "gs://sismica-docs/lineas/", "pad": "{}"}}"#, padding);
    let (status, body) = post(&t.app, "/enqueue_tasks", &oversized).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert!(body.get("archivo").is_none());
    assert!(t.queue.tasks().is_empty());

    let oversized = format!(
        r#"{{"bucket_name": "sismica-docs", "blob_name": "lineas/SG00577.pdf", "pad": "{}"}}"#,
        padding
    );
    let (status, body) = post(&t.app, "/process_single", &oversized).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(body["archivo"], "");
    assert_eq!(t.model.call_count(), 0);
}
