//! Single-document extraction: fetch, prompt, generate, store, record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use sismica_core::{
    DocumentModel, DocumentStore, Error, ExtractionRequest, PipelineVariant, ProcessingMetric,
};
use sismica_store::{MetricsStore, ResultStore};

/// Successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub archivo: String,
    pub elapsed: Duration,
}

impl ProcessReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Failed run. The error message is what callers report.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ProcessFailure {
    pub archivo: String,
    pub error: Error,
    pub elapsed: Duration,
}

pub struct ExtractionPipeline {
    store: Arc<dyn DocumentStore>,
    model: Arc<dyn DocumentModel>,
    prompt: Arc<str>,
    results: ResultStore,
    metrics: Option<MetricsStore>,
    variant: PipelineVariant,
}

impl ExtractionPipeline {
    /// `metrics` is ignored for variants that do not record metrics.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        model: Arc<dyn DocumentModel>,
        prompt: Arc<str>,
        results: ResultStore,
        metrics: Option<MetricsStore>,
        variant: PipelineVariant,
    ) -> Self {
        Self {
            store,
            model,
            prompt,
            results,
            metrics: metrics.filter(|_| variant.records_metrics()),
            variant,
        }
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    /// Run the whole pipeline for one document.
    ///
    /// With metrics enabled every attempt appends exactly one metric row:
    /// `success` after the result is stored, otherwise `error`. A failed
    /// success-metric write turns the run into a failure; a failed
    /// error-metric write is only logged.
    pub async fn process(
        &self,
        request: &ExtractionRequest,
    ) -> std::result::Result<ProcessReport, ProcessFailure> {
        let start = Instant::now();
        let archivo = request.blob_name.as_str();

        match self.run(request, start).await {
            Ok(()) => {
                let elapsed = start.elapsed();
                info!(
                    subsystem = "jobs",
                    component = "pipeline",
                    op = "process",
                    bucket = %request.bucket_name,
                    archivo,
                    model = %request.model_version,
                    duration_ms = elapsed.as_millis() as u64,
                    success = true,
                    "Document processed"
                );
                Ok(ProcessReport {
                    archivo: archivo.to_string(),
                    elapsed,
                })
            }
            Err(e) => {
                let elapsed = start.elapsed();
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    op = "process",
                    bucket = %request.bucket_name,
                    archivo,
                    model = %request.model_version,
                    duration_ms = elapsed.as_millis() as u64,
                    success = false,
                    error = %e,
                    "Document processing failed"
                );
                if let Some(ref metrics) = self.metrics {
                    let metric = ProcessingMetric::failure(
                        archivo,
                        &e.to_string(),
                        elapsed.as_secs_f64(),
                        &request.model_version,
                    );
                    if let Err(metric_err) = metrics.record(&metric).await {
                        warn!(
                            subsystem = "jobs",
                            component = "pipeline",
                            archivo,
                            error = %metric_err,
                            "Could not record error metric"
                        );
                    }
                }
                Err(ProcessFailure {
                    archivo: archivo.to_string(),
                    error: e,
                    elapsed,
                })
            }
        }
    }

    async fn run(&self, request: &ExtractionRequest, start: Instant) -> sismica_core::Result<()> {
        let document = self
            .store
            .fetch(&request.bucket_name, &request.blob_name)
            .await?;
        let respuesta = self
            .model
            .generate_from_document(&document, &self.prompt, &request.model_version)
            .await?;
        self.results.upsert(&request.blob_name, &respuesta).await?;

        if let Some(ref metrics) = self.metrics {
            let metric = ProcessingMetric::success(
                &request.blob_name,
                start.elapsed().as_secs_f64(),
                &request.model_version,
            );
            metrics.record(&metric).await?;
        }
        Ok(())
    }
}
