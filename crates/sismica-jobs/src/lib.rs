//! # sismica-jobs
//!
//! Work orchestration for the extraction service.
//!
//! This crate provides:
//! - Batch dispatch: list a bucket prefix and enqueue one task per document
//! - The Cloud Tasks queue backend
//! - The single-document extraction pipeline

pub mod dispatcher;
pub mod pipeline;
pub mod queue;

// Re-export core types
pub use sismica_core::*;

pub use dispatcher::{is_supported_document, StoragePath, TaskDispatcher};
pub use pipeline::{ExtractionPipeline, ProcessFailure, ProcessReport};
pub use queue::{task_request, CloudTasksConfig, CloudTasksQueue};

#[cfg(any(test, feature = "mock"))]
pub use queue::RecordingQueue;
